use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{RunError, StepError};

/// Max retries for a retriable step failure.
const STEP_MAX_RETRIES: usize = 3;
/// Delays between retries (exponential backoff).
const STEP_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

/// Sentinel memo value for completed sleeps.
fn sleep_marker() -> serde_json::Value {
    serde_json::Value::Bool(true)
}

/// Durable step scope for one workflow run.
///
/// Each named step's result is committed before the next step runs; re-entry
/// with the same name replays the committed value instead of re-executing.
/// Cancellation is checked before every not-yet-started step, never inside
/// one — an in-flight step runs to completion and its result is committed,
/// then the following step observes the cancellation.
pub struct StepContext {
    memo: Mutex<HashMap<String, serde_json::Value>>,
    cancel: CancellationToken,
}

impl StepContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    /// Re-enter a run with previously committed step results.
    pub fn resume(memo: HashMap<String, serde_json::Value>, cancel: CancellationToken) -> Self {
        Self {
            memo: Mutex::new(memo),
            cancel,
        }
    }

    /// Committed results so far, for checkpointing across process restarts.
    pub fn memo_snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.memo.lock().expect("memo mutex poisoned").clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn committed(&self, name: &str) -> Option<serde_json::Value> {
        self.memo.lock().expect("memo mutex poisoned").get(name).cloned()
    }

    fn commit(&self, name: &str, value: serde_json::Value) {
        self.memo
            .lock()
            .expect("memo mutex poisoned")
            .insert(name.to_string(), value);
    }

    /// Run a named step. Replays the committed result when re-entered,
    /// retries retriable failures with backoff, and refuses to start once
    /// the run is cancelled.
    pub async fn run<T, F, Fut>(&self, name: &str, op: F) -> Result<T, RunError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if let Some(value) = self.committed(name) {
            tracing::debug!(step = name, "replaying committed step result");
            return serde_json::from_value(value)
                .map_err(|e| RunError::NonRetriable(format!("corrupt step memo \"{name}\": {e}")));
        }

        let mut last_error = String::new();
        for attempt in 0..=STEP_MAX_RETRIES {
            if attempt > 0 {
                let delay = STEP_RETRY_DELAYS[attempt - 1];
                tracing::warn!(
                    step = name,
                    attempt = attempt + 1,
                    "retrying step after {}s: {last_error}",
                    delay.as_secs()
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(RunError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            match op().await {
                Ok(value) => {
                    let json = serde_json::to_value(&value).map_err(|e| {
                        RunError::NonRetriable(format!("unserializable step result \"{name}\": {e}"))
                    })?;
                    self.commit(name, json);
                    return Ok(value);
                }
                Err(StepError::NonRetriable(message)) => {
                    return Err(RunError::NonRetriable(message));
                }
                Err(StepError::Retriable(message)) => last_error = message,
            }
        }
        Err(RunError::RetriesExhausted {
            step: name.to_string(),
            attempts: STEP_MAX_RETRIES + 1,
            message: last_error,
        })
    }

    /// Named sleep. Replay skips the wait entirely.
    pub async fn sleep(&self, name: &str, duration: Duration) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if self.committed(name).is_some() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(RunError::Cancelled),
            _ = tokio::time::sleep(duration) => {}
        }
        self.commit(name, sleep_marker());
        Ok(())
    }
}

// ─── Cancellation registry ───

/// Live runs keyed by the message id their triggering event carried.
///
/// A cancellation event matches a run by message-id equality; matched runs
/// stop at their next step boundary. Unknown ids are ignored.
#[derive(Default)]
pub struct CancelRegistry {
    runs: Mutex<HashMap<String, CancellationToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run and get its cancellation token.
    pub fn register(&self, message_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.runs
            .lock()
            .expect("registry mutex poisoned")
            .insert(message_id.to_string(), token.clone());
        token
    }

    /// Deliver a cancellation event. Returns whether a run matched.
    pub fn cancel(&self, message_id: &str) -> bool {
        let runs = self.runs.lock().expect("registry mutex poisoned");
        match runs.get(message_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a finished run.
    pub fn remove(&self, message_id: &str) {
        self.runs
            .lock()
            .expect("registry mutex poisoned")
            .remove(message_id);
    }
}
