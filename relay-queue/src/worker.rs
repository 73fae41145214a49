//! Single-step worker.
//!
//! Leases one job, runs it, and reports the result through the gateway.
//! There is no loop here; callers decide when to call again.

use relay_core::TenantContext;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{CompletionStatus, JobExecutor, JobGateway, JobId, QueueError, WorkerId};

/// What one call to [`JobWorker::process_next`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Nothing was eligible for lease.
    Idle,
    Succeeded(JobId),
    Failed(JobId),
    RetryScheduled(JobId),
    /// The job ran but the store rejected the report.
    ReportRejected(JobId),
}

impl WorkOutcome {
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            WorkOutcome::Idle => None,
            WorkOutcome::Succeeded(id)
            | WorkOutcome::Failed(id)
            | WorkOutcome::RetryScheduled(id)
            | WorkOutcome::ReportRejected(id) => Some(id),
        }
    }
}

#[derive(Clone)]
pub struct JobWorker {
    worker_id: WorkerId,
    gateway: JobGateway,
    executor: JobExecutor,
}

impl JobWorker {
    pub fn new(worker_id: impl Into<WorkerId>, gateway: JobGateway, executor: JobExecutor) -> Self {
        Self {
            worker_id: worker_id.into(),
            gateway,
            executor,
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Lease, execute and report a single job.
    ///
    /// Retryable handler errors schedule a retry. Permanent errors and
    /// unknown job names complete the job as `failed` with
    /// `{"error": <message>}`.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, worker_id = %self.worker_id))]
    pub async fn process_next(&self, ctx: &TenantContext, job_family: Option<&str>) -> WorkOutcome {
        let Some(job) = self.gateway.get_next_job(ctx, &self.worker_id, job_family).await else {
            return WorkOutcome::Idle;
        };
        let job_id = job.id.clone();

        match self.executor.execute_job(&job.job_name, job.input_data).await {
            Ok(output) => {
                let reported = self
                    .gateway
                    .complete_job(ctx, &job_id, CompletionStatus::Succeeded, Some(output), None)
                    .await;
                info!(job_id = %job_id, job_name = %job.job_name, reported, "job succeeded");
                outcome(reported, WorkOutcome::Succeeded(job_id))
            }
            Err(e) if e.is_retryable() => {
                let scheduled = self.gateway.retry_job(ctx, &job_id, None).await;
                warn!(job_id = %job_id, job_name = %job.job_name, error = %e, scheduled, "job will be retried");
                outcome(scheduled, WorkOutcome::RetryScheduled(job_id))
            }
            Err(e) => {
                let message = match &e {
                    QueueError::JobFailed(job_err) => job_err.message().to_string(),
                    other => other.to_string(),
                };
                let reported = self
                    .gateway
                    .complete_job(ctx, &job_id, CompletionStatus::Failed, None, Some(json!({ "error": message })))
                    .await;
                warn!(job_id = %job_id, job_name = %job.job_name, error = %e, reported, "job failed");
                outcome(reported, WorkOutcome::Failed(job_id))
            }
        }
    }
}

fn outcome(reported: bool, outcome: WorkOutcome) -> WorkOutcome {
    match (reported, outcome.job_id()) {
        (false, Some(id)) => WorkOutcome::ReportRejected(id.clone()),
        _ => outcome,
    }
}
