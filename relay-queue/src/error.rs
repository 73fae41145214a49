use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for queue operations
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Invalid completion status: {0}")]
    InvalidStatus(String),

    #[error("Invalid tenant context: {0}")]
    InvalidTenant(String),

    #[error("Job execution failed: {0}")]
    JobFailed(#[from] JobError),

    #[error("No handler found for job type: {0}")]
    HandlerNotFound(String),

    #[error("Job type already registered: {0}")]
    DuplicateHandler(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// True when the error came from a handler and asked to be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::JobFailed(e) if e.is_retryable())
    }
}

/// Job execution outcome - determines retry behavior
#[derive(Error, Debug, Clone)]
pub enum JobError {
    /// Retryable error - the worker schedules a retry
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Permanent error - the worker completes the job as failed
    #[error("Permanent error: {0}")]
    Permanent(String),
}

impl JobError {
    /// Create a retryable error
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::JobNotFound("row not found".to_string()),
            other => Self::Store(other.to_string()),
        }
    }
}
