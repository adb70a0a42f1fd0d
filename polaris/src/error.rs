use crate::store::StoreError;

/// Failure of a single durable step.
///
/// The engine retries `Retriable` failures with backoff; `NonRetriable`
/// failures abort the run immediately.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Retriable(String),
    #[error("{0}")]
    NonRetriable(String),
}

impl StepError {
    pub fn retriable(message: impl Into<String>) -> Self {
        Self::Retriable(message.into())
    }

    pub fn non_retriable(message: impl Into<String>) -> Self {
        Self::NonRetriable(message.into())
    }
}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        match err {
            // A rejected credential cannot heal on retry.
            StoreError::Unauthorized => Self::NonRetriable(err.to_string()),
            StoreError::Backend(_) => Self::Retriable(err.to_string()),
        }
    }
}

/// Terminal outcome of a workflow run that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Missing or invalid deployment configuration. Surfaced before any step
    /// runs; nothing was written.
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    NonRetriable(String),
    #[error("step \"{step}\" failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        step: String,
        attempts: usize,
        message: String,
    },
    /// A cancellation event matched this run. Not routed to the failure
    /// handler; the cancelling caller owns the message from here.
    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
