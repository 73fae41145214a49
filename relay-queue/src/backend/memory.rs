use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use relay_core::TenantContext;
use tracing::debug;

use crate::{
    backend::JobStore, JobCompletion, JobId, JobRecord, JobStatus, NewJob, QueueError,
    QueueResult, WorkerId,
};

/// A record plus the bookkeeping the store keeps to itself.
#[derive(Debug, Clone)]
struct StoredJob {
    record: JobRecord,
    /// Insertion order, for FIFO leasing
    seq: u64,
    /// Earliest time a retry-scheduled job may be leased again
    run_at: DateTime<Utc>,
    attempts: u32,
}

impl StoredJob {
    /// Promote an elapsed retry back to `queued`.
    fn promote_due(&mut self, now: DateTime<Utc>) {
        if self.record.status == JobStatus::RetryScheduled && self.run_at <= now {
            self.record.status = JobStatus::Queued;
        }
    }

    fn is_eligible(&self, ctx: &TenantContext, job_family: Option<&str>) -> bool {
        self.record.status == JobStatus::Queued
            && ctx.owns(&self.record.tenant_id)
            && job_family.map_or(true, |family| self.record.job_family.as_deref() == Some(family))
    }
}

/// A completion call as the store received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCompletion {
    pub tenant_id: String,
    pub job_id: JobId,
    pub completion: JobCompletion,
}

/// In-memory job store for tests and development.
///
/// Leasing happens under one write lock, so it is atomic across concurrent
/// callers in the same process.
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, StoredJob>>>,
    next_seq: AtomicU64,
    completions: Arc<Mutex<Vec<RecordedCompletion>>>,
    tenant_contexts: Arc<Mutex<Vec<String>>>,
    fail_tenant_context: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
            completions: Arc::new(Mutex::new(Vec::new())),
            tenant_contexts: Arc::new(Mutex::new(Vec::new())),
            fail_tenant_context: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Producer side: queue a job for `ctx`'s tenant.
    pub fn enqueue(&self, ctx: &TenantContext, job: NewJob) -> JobId {
        self.enqueue_with_id(ctx, JobId::new(), job)
    }

    /// Queue a job under a caller-chosen id (replaces any job with that id).
    pub fn enqueue_with_id(&self, ctx: &TenantContext, job_id: JobId, job: NewJob) -> JobId {
        let record = JobRecord::queued(job_id.clone(), ctx.tenant(), job);
        let stored = StoredJob {
            run_at: record.created_at,
            record,
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            attempts: 0,
        };
        self.jobs.write().insert(job_id.clone(), stored);
        debug!(job_id = %job_id, tenant_id = %ctx.tenant_id, "enqueued job");
        job_id
    }

    /// Read a job as its tenant sees it.
    pub fn get_job(&self, ctx: &TenantContext, job_id: &JobId) -> QueueResult<JobRecord> {
        let now = Utc::now();
        let jobs = self.jobs.read();
        let stored = jobs
            .get(job_id)
            .filter(|stored| ctx.owns(&stored.record.tenant_id))
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        let mut view = stored.clone();
        view.promote_due(now);
        Ok(view.record)
    }

    /// How many times a job has been leased.
    pub fn attempts(&self, job_id: &JobId) -> Option<u32> {
        self.jobs.read().get(job_id).map(|stored| stored.attempts)
    }

    /// Every `complete_job` call received so far, in order.
    pub fn completions(&self) -> Vec<RecordedCompletion> {
        self.completions.lock().clone()
    }

    /// Tenants passed to `set_tenant_context`, in order.
    pub fn tenant_contexts(&self) -> Vec<String> {
        self.tenant_contexts.lock().clone()
    }

    /// Make `set_tenant_context` fail from now on.
    pub fn set_fail_tenant_context(&self, fail: bool) {
        self.fail_tenant_context.store(fail, Ordering::SeqCst);
    }

    /// Make every operation fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Let a retry-scheduled job become eligible right away.
    pub fn expire_retry_delay(&self, job_id: &JobId) -> QueueResult<()> {
        let mut jobs = self.jobs.write();
        let stored = jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        stored.run_at = Utc::now();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    fn check_available(&self) -> QueueResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Store("job store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn set_tenant_context(&self, ctx: &TenantContext) -> QueueResult<()> {
        self.check_available()?;
        self.tenant_contexts.lock().push(ctx.tenant().to_string());

        if self.fail_tenant_context.load(Ordering::SeqCst) {
            return Err(QueueError::Store("set_config rejected".to_string()));
        }
        Ok(())
    }

    async fn get_next_job(
        &self,
        ctx: &TenantContext,
        worker_id: &WorkerId,
        job_family: Option<&str>,
    ) -> QueueResult<Option<JobRecord>> {
        self.check_available()?;
        let now = Utc::now();
        let mut jobs = self.jobs.write();

        let next = jobs
            .values_mut()
            .filter_map(|stored| {
                stored.promote_due(now);
                stored.is_eligible(ctx, job_family).then_some(stored)
            })
            .min_by_key(|stored| stored.seq);

        Ok(next.map(|stored| {
            stored.attempts += 1;
            stored.record.lease(worker_id, now);
            stored.record.clone()
        }))
    }

    async fn complete_job(
        &self,
        ctx: &TenantContext,
        job_id: &JobId,
        completion: JobCompletion,
    ) -> QueueResult<()> {
        self.check_available()?;
        self.completions.lock().push(RecordedCompletion {
            tenant_id: ctx.tenant().to_string(),
            job_id: job_id.clone(),
            completion: completion.clone(),
        });

        let mut jobs = self.jobs.write();
        let stored = jobs
            .get_mut(job_id)
            .filter(|stored| ctx.owns(&stored.record.tenant_id))
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        stored.record.complete(completion, Utc::now())
    }

    async fn retry_job(&self, ctx: &TenantContext, job_id: &JobId, delay: Duration) -> QueueResult<bool> {
        self.check_available()?;
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| QueueError::Internal(format!("retry delay out of range: {e}")))?;
        let now = Utc::now();
        let run_at = now
            .checked_add_signed(delay)
            .ok_or_else(|| QueueError::Internal(format!("retry delay of {}s overflows the clock", delay.num_seconds())))?;

        let mut jobs = self.jobs.write();
        let stored = jobs
            .get_mut(job_id)
            .filter(|stored| ctx.owns(&stored.record.tenant_id))
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        if !stored.record.schedule_retry(now) {
            return Ok(false);
        }
        stored.run_at = run_at;
        Ok(true)
    }

    async fn update_heartbeat(
        &self,
        ctx: &TenantContext,
        job_id: &JobId,
        worker_id: &WorkerId,
    ) -> QueueResult<u64> {
        self.check_available()?;
        let mut jobs = self.jobs.write();

        match jobs.get_mut(job_id) {
            Some(stored) if ctx.owns(&stored.record.tenant_id) && stored.record.is_leased_by(worker_id) => {
                stored.record.touch_heartbeat(Utc::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
