use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::job::builtin::{
    BackupCleanupJob, CodeGenerationJob, DataMigrationJob, DesignGenerationJob, EmailSendJob,
    HealthCheckJob, SecurityScanJob, WebhookProcessJob,
};
use crate::job::registry::{ConcreteJobHandler, JobHandler};
use crate::{Job, QueueError};

/// The closed set of job types this service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    SecurityScan,
    CodeGeneration,
    DesignGeneration,
    DataMigration,
    BackupCleanup,
    HealthCheck,
    EmailSend,
    WebhookProcess,
}

impl JobKind {
    pub const ALL: [JobKind; 8] = [
        JobKind::SecurityScan,
        JobKind::CodeGeneration,
        JobKind::DesignGeneration,
        JobKind::DataMigration,
        JobKind::BackupCleanup,
        JobKind::HealthCheck,
        JobKind::EmailSend,
        JobKind::WebhookProcess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SecurityScan => SecurityScanJob::JOB_TYPE,
            JobKind::CodeGeneration => CodeGenerationJob::JOB_TYPE,
            JobKind::DesignGeneration => DesignGenerationJob::JOB_TYPE,
            JobKind::DataMigration => DataMigrationJob::JOB_TYPE,
            JobKind::BackupCleanup => BackupCleanupJob::JOB_TYPE,
            JobKind::HealthCheck => HealthCheckJob::JOB_TYPE,
            JobKind::EmailSend => EmailSendJob::JOB_TYPE,
            JobKind::WebhookProcess => WebhookProcessJob::JOB_TYPE,
        }
    }

    /// The handler for this kind. Adding a variant without a handler does
    /// not compile.
    pub fn handler(&self) -> Arc<dyn JobHandler> {
        match self {
            JobKind::SecurityScan => Arc::new(ConcreteJobHandler::new(SecurityScanJob)),
            JobKind::CodeGeneration => Arc::new(ConcreteJobHandler::new(CodeGenerationJob)),
            JobKind::DesignGeneration => Arc::new(ConcreteJobHandler::new(DesignGenerationJob)),
            JobKind::DataMigration => Arc::new(ConcreteJobHandler::new(DataMigrationJob)),
            JobKind::BackupCleanup => Arc::new(ConcreteJobHandler::new(BackupCleanupJob)),
            JobKind::HealthCheck => Arc::new(ConcreteJobHandler::new(HealthCheckJob)),
            JobKind::EmailSend => Arc::new(ConcreteJobHandler::new(EmailSendJob)),
            JobKind::WebhookProcess => Arc::new(ConcreteJobHandler::new(WebhookProcessJob)),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| QueueError::HandlerNotFound(s.to_string()))
    }
}
