//! Outbound contract to the durable job store.
//!
//! The store owns every state transition. Lease acquisition in particular
//! must be atomic on the store side: two concurrent `get_next_job` calls for
//! the same tenant and family never return the same job.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use relay_core::TenantContext;
use std::time::Duration;

use crate::{JobCompletion, JobId, JobRecord, QueueResult, WorkerId};

/// Storage primitives used by the gateway.
///
/// Every operation receives the caller's tenant context; implementations
/// must treat jobs of another tenant as missing.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Scope subsequent work to `ctx`'s tenant.
    async fn set_tenant_context(&self, ctx: &TenantContext) -> QueueResult<()>;

    /// Atomically lease the next eligible job, stamping `worker_id` on it.
    async fn get_next_job(
        &self,
        ctx: &TenantContext,
        worker_id: &WorkerId,
        job_family: Option<&str>,
    ) -> QueueResult<Option<JobRecord>>;

    /// Record a terminal outcome for a leased job.
    async fn complete_job(
        &self,
        ctx: &TenantContext,
        job_id: &JobId,
        completion: JobCompletion,
    ) -> QueueResult<()>;

    /// Send a job back toward `queued` after `delay`. Returns whether a retry
    /// was scheduled.
    async fn retry_job(&self, ctx: &TenantContext, job_id: &JobId, delay: Duration) -> QueueResult<bool>;

    /// Refresh the heartbeat of a job held by `worker_id`. Returns the number
    /// of rows touched (0 or 1).
    ///
    /// Only a job currently leased by `worker_id` counts: once it has been
    /// completed or sent back for retry the heartbeat touches nothing.
    async fn update_heartbeat(
        &self,
        ctx: &TenantContext,
        job_id: &JobId,
        worker_id: &WorkerId,
    ) -> QueueResult<u64>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
