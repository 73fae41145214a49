use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::record::empty_object;
use crate::{Job, JobError, JobKind, QueueError, QueueResult};

/// Type-erased job handler for runtime dispatch
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute a job with its raw input payload
    async fn execute(&self, input: Value) -> Result<Value, JobError>;

    /// Get the job type this handler processes
    fn job_type(&self) -> &'static str;
}

/// Bridges a typed [`Job`] to [`JobHandler`]
pub(crate) struct ConcreteJobHandler<J: Job> {
    job: J,
}

impl<J: Job> ConcreteJobHandler<J> {
    pub(crate) fn new(job: J) -> Self {
        Self { job }
    }
}

#[async_trait]
impl<J: Job> JobHandler for ConcreteJobHandler<J> {
    async fn execute(&self, input: Value) -> Result<Value, JobError> {
        // A missing payload means "no arguments".
        let input = if input.is_null() { empty_object() } else { input };

        let input: J::Input = serde_json::from_value(input)
            .map_err(|e| JobError::Permanent(format!("Invalid input for {}: {}", J::JOB_TYPE, e)))?;

        let output = self.job.execute(input).await?;

        serde_json::to_value(output)
            .map_err(|e| JobError::Permanent(format!("Failed to serialize result: {}", e)))
    }

    fn job_type(&self) -> &'static str {
        J::JOB_TYPE
    }
}

/// Registry mapping job names to handlers.
///
/// Immutable once built; lookups are exact string matches.
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    /// Create an empty job registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry holding a handler for every [`JobKind`]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in JobKind::ALL {
            registry.handlers.insert(kind.as_str().to_string(), kind.handler());
        }
        registry
    }

    /// Register a typed job
    pub fn register<J: Job>(&mut self, job: J) -> QueueResult<()> {
        self.register_handler(Arc::new(ConcreteJobHandler::new(job)))
    }

    /// Register an already type-erased handler
    pub fn register_handler(&mut self, handler: Arc<dyn JobHandler>) -> QueueResult<()> {
        let job_type = handler.job_type().to_string();

        if self.handlers.contains_key(&job_type) {
            return Err(QueueError::DuplicateHandler(job_type));
        }

        self.handlers.insert(job_type, handler);
        Ok(())
    }

    /// Look up the handler for `job_name`
    pub fn handler(&self, job_name: &str) -> QueueResult<Arc<dyn JobHandler>> {
        self.handlers
            .get(job_name)
            .cloned()
            .ok_or_else(|| QueueError::HandlerNotFound(job_name.to_string()))
    }

    /// Check if a job type is registered
    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// All registered job types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Deserialize)]
    struct EchoInput {
        data: String,
    }

    #[derive(Serialize)]
    struct EchoOutput {
        processed: String,
    }

    struct EchoJob;

    #[async_trait]
    impl Job for EchoJob {
        type Input = EchoInput;
        type Output = EchoOutput;

        const JOB_TYPE: &'static str = "echo";

        async fn execute(&self, input: EchoInput) -> Result<EchoOutput, JobError> {
            Ok(EchoOutput {
                processed: format!("Processed: {}", input.data),
            })
        }
    }

    #[tokio::test]
    async fn registered_job_decodes_input_and_encodes_output() {
        let mut registry = JobRegistry::new();
        registry.register(EchoJob).unwrap();

        assert!(registry.is_registered("echo"));
        assert_eq!(registry.registered_types(), vec!["echo"]);

        let handler = registry.handler("echo").unwrap();
        let output = handler.execute(json!({"data": "test"})).await.unwrap();
        assert_eq!(output, json!({"processed": "Processed: test"}));
    }

    #[tokio::test]
    async fn bad_input_is_a_permanent_error() {
        let mut registry = JobRegistry::new();
        registry.register(EchoJob).unwrap();

        let err = registry.handler("echo").unwrap().execute(json!({"data": 7})).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.message().contains("Invalid input for echo"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = JobRegistry::new();
        registry.register(EchoJob).unwrap();
        assert!(matches!(registry.register(EchoJob), Err(QueueError::DuplicateHandler(t)) if t == "echo"));
    }

    #[test]
    fn unknown_job_type_names_the_type() {
        let registry = JobRegistry::builtin();
        let err = registry.handler("nonexistent_job").err().unwrap();
        assert_eq!(err.to_string(), "No handler found for job type: nonexistent_job");
    }

    #[test]
    fn builtin_covers_every_kind() {
        let registry = JobRegistry::builtin();
        for kind in JobKind::ALL {
            assert!(registry.is_registered(kind.as_str()), "{} missing", kind);
        }
        assert_eq!(registry.registered_types().len(), JobKind::ALL.len());
    }
}
