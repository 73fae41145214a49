use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{JobRegistry, QueueError, QueueResult};

/// Runs a job's input through the handler registered for its name.
///
/// Handler failures are returned as [`QueueError::JobFailed`]; the executor
/// never retries and never completes jobs itself.
#[derive(Clone)]
pub struct JobExecutor {
    registry: Arc<JobRegistry>,
}

impl JobExecutor {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    /// Executor over every built-in handler
    pub fn builtin() -> Self {
        Self::new(Arc::new(JobRegistry::builtin()))
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    #[instrument(skip_all, fields(job_name = %job_name))]
    pub async fn execute_job(&self, job_name: &str, input: Value) -> QueueResult<Value> {
        let handler = self.registry.handler(job_name)?;
        let started = Instant::now();

        match handler.execute(input).await {
            Ok(output) => {
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "job handler finished");
                Ok(output)
            }
            Err(e) => {
                warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    retryable = e.is_retryable(),
                    error = %e,
                    "job handler failed"
                );
                Err(QueueError::JobFailed(e))
            }
        }
    }
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_job_names_fail_loudly() {
        let executor = JobExecutor::builtin();
        let err = executor.execute_job("nonexistent_job", json!({})).await.unwrap_err();

        assert!(matches!(err, QueueError::HandlerNotFound(_)));
        let msg = err.to_string();
        assert!(msg.contains("nonexistent_job"));
        assert!(msg.contains("No handler found"));
    }

    #[tokio::test]
    async fn health_check_resolves_with_its_shape() {
        let output = JobExecutor::builtin()
            .execute_job("health_check", json!({}))
            .await
            .unwrap();

        for key in ["services_healthy", "response_time_avg", "uptime_percentage"] {
            assert!(output.get(key).is_some(), "missing {key}");
        }
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let err = JobExecutor::builtin()
            .execute_job("email_send", json!({"to": ["not-an-address"]}))
            .await
            .unwrap_err();

        match err {
            QueueError::JobFailed(job_err) => assert!(!job_err.is_retryable()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn lookup_is_exact() {
        let err = JobExecutor::builtin()
            .execute_job("HEALTH_CHECK", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::HandlerNotFound(name) if name == "HEALTH_CHECK"));
    }
}
