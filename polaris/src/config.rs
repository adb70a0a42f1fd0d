use std::time::Duration;

use crate::model::GenerationParams;

/// Env var holding the shared credential passed on every store call.
pub const INTERNAL_KEY_ENV: &str = "POLARIS_INTERNAL_KEY";

/// Engine settings: the shared store credential plus run tunables.
///
/// The iteration cap and model parameters are deployment configuration, not
/// invariants; defaults below match the reference deployment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Shared credential for the document store. `None` is a fatal
    /// configuration fault checked before any step runs.
    pub internal_key: Option<String>,
    /// Hard ceiling on model turns per run.
    pub max_iterations: usize,
    /// How many recent messages to load as conversation context.
    pub recent_history_limit: usize,
    /// Fixed delay before the first read, covering store replication lag.
    pub db_sync_delay: Duration,
    pub coding_model: String,
    pub coding_params: GenerationParams,
    pub title_model: String,
    pub title_params: GenerationParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            internal_key: None,
            max_iterations: 20,
            recent_history_limit: 10,
            db_sync_delay: Duration::from_secs(1),
            coding_model: "gemini-3.0-flash".to_string(),
            coding_params: GenerationParams {
                temperature: 0.3,
                max_output_tokens: 16_000,
            },
            title_model: "gemini-2.5-flash".to_string(),
            title_params: GenerationParams {
                temperature: 0.0,
                max_output_tokens: 50,
            },
        }
    }
}

impl EngineConfig {
    /// Defaults with the credential read from the environment.
    pub fn from_env() -> Self {
        Self {
            internal_key: std::env::var(INTERNAL_KEY_ENV).ok().filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_internal_key(mut self, key: impl Into<String>) -> Self {
        self.internal_key = Some(key.into());
        self
    }
}
