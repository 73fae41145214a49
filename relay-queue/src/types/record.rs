use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::{JobId, WorkerId};
use crate::{QueueError, QueueResult};

/// Job status lifecycle
///
/// `queued -> leased -> (succeeded | failed | retry_scheduled)`, and a
/// retry-scheduled job returns to `queued` once its delay has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker
    Queued,

    /// Held by exactly one worker
    Leased,

    /// Completed with output
    Succeeded,

    /// Completed with an error payload
    Failed,

    /// Waiting out a retry delay before becoming queued again
    RetryScheduled,
}

impl JobStatus {
    /// Get the status name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Leased => "leased",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::RetryScheduled => "retry_scheduled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" | "pending" => Ok(Self::Queued),
            "leased" | "running" => Ok(Self::Leased),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "retry_scheduled" | "retrying" => Ok(Self::RetryScheduled),
            other => Err(QueueError::SerializationError(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

/// Terminal status a worker may report through `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Succeeded,
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl From<CompletionStatus> for JobStatus {
    fn from(status: CompletionStatus) -> Self {
        match status {
            CompletionStatus::Succeeded => JobStatus::Succeeded,
            CompletionStatus::Failed => JobStatus::Failed,
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(QueueError::InvalidStatus(other.to_string())),
        }
    }
}

/// Arguments of the store's completion operation.
///
/// Both payloads default to an empty object when the caller omits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCompletion {
    pub status: CompletionStatus,
    pub output_data: Value,
    pub error_data: Value,
}

impl JobCompletion {
    pub fn new(status: CompletionStatus, output_data: Option<Value>, error_data: Option<Value>) -> Self {
        Self {
            status,
            output_data: output_data.unwrap_or_else(empty_object),
            error_data: error_data.unwrap_or_else(empty_object),
        }
    }

    pub fn succeeded(output_data: Value) -> Self {
        Self::new(CompletionStatus::Succeeded, Some(output_data), None)
    }

    pub fn failed(error_data: Value) -> Self {
        Self::new(CompletionStatus::Failed, None, Some(error_data))
    }
}

pub(crate) fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Job record as the store hands it back to workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier
    pub id: JobId,

    /// Owning tenant
    pub tenant_id: String,

    /// Queue/category name, used to scope leases
    pub job_family: Option<String>,

    /// Selects the handler that executes the job
    pub job_name: String,

    /// Handler input
    pub input_data: Value,

    pub status: JobStatus,

    /// Worker holding (or last holding) the lease
    pub worker_id: Option<String>,

    /// Last liveness signal from the lease holder
    pub worker_heartbeat: Option<DateTime<Utc>>,

    /// Set only by a `succeeded` completion
    pub output_data: Option<Value>,

    /// Set only by a `failed` completion or a retry
    pub error_data: Option<Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A freshly queued job
    pub fn queued(id: JobId, tenant_id: impl Into<String>, new_job: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id: tenant_id.into(),
            job_family: new_job.job_family,
            job_name: new_job.job_name,
            input_data: new_job.input_data,
            status: JobStatus::Queued,
            worker_id: None,
            worker_heartbeat: None,
            output_data: None,
            error_data: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `worker` currently holds the lease
    pub fn is_leased_by(&self, worker: &WorkerId) -> bool {
        self.status == JobStatus::Leased && self.worker_id.as_deref() == Some(worker.as_str())
    }

    /// Stamp a lease for `worker`
    pub fn lease(&mut self, worker: &WorkerId, now: DateTime<Utc>) {
        self.status = JobStatus::Leased;
        self.worker_id = Some(worker.0.clone());
        self.worker_heartbeat = Some(now);
        self.updated_at = now;
    }

    /// Apply a terminal completion; only valid from `leased`
    pub fn complete(&mut self, completion: JobCompletion, now: DateTime<Utc>) -> QueueResult<()> {
        if self.status != JobStatus::Leased {
            return Err(QueueError::InvalidTransition {
                job_id: self.id.to_string(),
                from: self.status.name(),
                to: completion.status.as_str(),
            });
        }

        match completion.status {
            CompletionStatus::Succeeded => {
                self.output_data = Some(completion.output_data);
                self.error_data = None;
            }
            CompletionStatus::Failed => {
                self.output_data = None;
                self.error_data = Some(completion.error_data);
            }
        }
        self.status = completion.status.into();
        self.updated_at = now;
        Ok(())
    }

    /// Move back toward the queue. Leased and failed jobs can be retried.
    ///
    /// Returns false (and leaves the record untouched) for any other status.
    pub fn schedule_retry(&mut self, now: DateTime<Utc>) -> bool {
        if !matches!(self.status, JobStatus::Leased | JobStatus::Failed) {
            return false;
        }
        self.status = JobStatus::RetryScheduled;
        self.worker_id = None;
        self.worker_heartbeat = None;
        self.output_data = None;
        self.updated_at = now;
        true
    }

    /// Refresh the heartbeat of a lease
    pub fn touch_heartbeat(&mut self, now: DateTime<Utc>) {
        self.worker_heartbeat = Some(now);
        self.updated_at = now;
    }
}

/// Producer-side submission of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub job_name: String,
    pub job_family: Option<String>,
    pub input_data: Value,
}

impl NewJob {
    pub fn new(job_name: impl Into<String>, input_data: Value) -> Self {
        Self {
            job_name: job_name.into(),
            job_family: None,
            input_data,
        }
    }

    pub fn with_family(mut self, job_family: impl Into<String>) -> Self {
        self.job_family = Some(job_family.into());
        self
    }
}
