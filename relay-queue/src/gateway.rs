//! Job store gateway.
//!
//! Turns the four worker operations into store calls and folds every store
//! failure into `false` / `None` after logging it. Callers never see a store
//! error from here.

use std::sync::Arc;
use std::time::Duration;

use relay_core::TenantContext;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::{
    backend::JobStore, tenant::set_tenant_context, CompletionStatus, JobCompletion, JobId,
    JobRecord, WorkerId,
};

/// Delay passed to `retry_job` when the caller does not choose one.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct JobGateway {
    store: Arc<dyn JobStore>,
    retry_delay: Duration,
}

impl JobGateway {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Lease the next job for `worker_id`, or `None` when there is nothing
    /// to lease or the store failed.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, worker_id = %worker_id, job_family = ?job_family))]
    pub async fn get_next_job(
        &self,
        ctx: &TenantContext,
        worker_id: &WorkerId,
        job_family: Option<&str>,
    ) -> Option<JobRecord> {
        set_tenant_context(self.store.as_ref(), ctx).await;

        match self.store.get_next_job(ctx, worker_id, job_family).await {
            Ok(Some(job)) => {
                debug!(job_id = %job.id, job_name = %job.job_name, "leased job");
                Some(job)
            }
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, store = self.store.name(), "error getting next job");
                None
            }
        }
    }

    /// Record a terminal outcome. Missing payloads are sent as `{}`.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, job_id = %job_id, status = %status))]
    pub async fn complete_job(
        &self,
        ctx: &TenantContext,
        job_id: &JobId,
        status: CompletionStatus,
        output_data: Option<Value>,
        error_data: Option<Value>,
    ) -> bool {
        let completion = JobCompletion::new(status, output_data, error_data);

        match self.store.complete_job(ctx, job_id, completion).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, store = self.store.name(), "error completing job");
                false
            }
        }
    }

    /// Schedule a retry after `delay`, or after the gateway's default delay.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, job_id = %job_id))]
    pub async fn retry_job(&self, ctx: &TenantContext, job_id: &JobId, delay: Option<Duration>) -> bool {
        let delay = delay.unwrap_or(self.retry_delay);

        match self.store.retry_job(ctx, job_id, delay).await {
            Ok(scheduled) => {
                debug!(scheduled, delay_secs = delay.as_secs(), "retry requested");
                scheduled
            }
            Err(e) => {
                error!(error = %e, store = self.store.name(), "error retrying job");
                false
            }
        }
    }

    /// Refresh the heartbeat of a job `worker_id` holds. `false` when no row
    /// matched.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, job_id = %job_id, worker_id = %worker_id))]
    pub async fn update_heartbeat(&self, ctx: &TenantContext, job_id: &JobId, worker_id: &WorkerId) -> bool {
        match self.store.update_heartbeat(ctx, job_id, worker_id).await {
            Ok(rows) => rows > 0,
            Err(e) => {
                error!(error = %e, store = self.store.name(), "error updating heartbeat");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::memory::MemoryJobStore, JobStatus, NewJob};
    use serde_json::json;
    use tracing_test::traced_test;

    fn setup() -> (Arc<MemoryJobStore>, JobGateway) {
        let store = Arc::new(MemoryJobStore::new());
        let gateway = JobGateway::new(store.clone());
        (store, gateway)
    }

    fn t1() -> TenantContext {
        TenantContext::new("t1")
    }

    #[tokio::test]
    async fn lease_sets_tenant_context_first() {
        let (store, gateway) = setup();
        let id = store.enqueue(&t1(), NewJob::new("email_send", json!({})).with_family("emails"));

        let job = gateway.get_next_job(&t1(), &"w1".into(), Some("emails")).await.unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Leased);
        assert_eq!(job.worker_id.as_deref(), Some("w1"));
        assert_eq!(store.tenant_contexts(), vec!["t1".to_string()]);

        assert!(gateway.get_next_job(&t1(), &"w2".into(), Some("emails")).await.is_none());
    }

    #[tokio::test]
    async fn lease_still_attempted_when_tenant_context_fails() {
        let (store, gateway) = setup();
        store.enqueue(&t1(), NewJob::new("health_check", json!({})));
        store.set_fail_tenant_context(true);

        assert!(gateway.get_next_job(&t1(), &"w1".into(), None).await.is_some());
    }

    #[tokio::test]
    async fn complete_passes_status_and_payload_through() {
        let (store, gateway) = setup();
        let id = store.enqueue_with_id(&t1(), JobId::from("j1"), NewJob::new("health_check", json!({})));
        gateway.get_next_job(&t1(), &"w1".into(), None).await.unwrap();

        let ok = gateway
            .complete_job(&t1(), &id, CompletionStatus::Succeeded, Some(json!({"x": 1})), None)
            .await;
        assert!(ok);

        let calls = store.completions();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].job_id, JobId::from("j1"));
        assert_eq!(calls[0].completion.status, CompletionStatus::Succeeded);
        assert_eq!(calls[0].completion.output_data, json!({"x": 1}));
        assert_eq!(calls[0].completion.error_data, json!({}));

        let job = store.get_job(&t1(), &id).unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.output_data, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn foreign_tenant_operations_report_false() {
        let (store, gateway) = setup();
        let id = store.enqueue(&t1(), NewJob::new("health_check", json!({})));
        gateway.get_next_job(&t1(), &"w1".into(), None).await.unwrap();

        let t2 = TenantContext::new("t2");
        assert!(!gateway.complete_job(&t2, &id, CompletionStatus::Failed, None, None).await);
        assert!(!gateway.retry_job(&t2, &id, None).await);
        assert!(!gateway.update_heartbeat(&t2, &id, &"w1".into()).await);

        assert_eq!(store.get_job(&t1(), &id).unwrap().status, JobStatus::Leased);
    }

    #[tokio::test]
    async fn heartbeat_reflects_lease_holder() {
        let (store, gateway) = setup();
        let id = store.enqueue(&t1(), NewJob::new("health_check", json!({})));
        gateway.get_next_job(&t1(), &"w1".into(), None).await.unwrap();

        assert!(gateway.update_heartbeat(&t1(), &id, &"w1".into()).await);
        assert!(gateway.update_heartbeat(&t1(), &id, &"w1".into()).await);
        assert!(!gateway.update_heartbeat(&t1(), &id, &"w2".into()).await);
    }

    #[tokio::test]
    async fn retry_uses_default_delay() {
        let (store, gateway) = setup();
        let id = store.enqueue(&t1(), NewJob::new("health_check", json!({})));
        gateway.get_next_job(&t1(), &"w1".into(), None).await.unwrap();

        assert_eq!(gateway.retry_delay(), Duration::from_secs(60));
        assert!(gateway.retry_job(&t1(), &id, None).await);
        assert_eq!(store.get_job(&t1(), &id).unwrap().status, JobStatus::RetryScheduled);
        assert!(gateway.get_next_job(&t1(), &"w1".into(), None).await.is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn oversized_retry_delay_reports_false() {
        let store = Arc::new(MemoryJobStore::new());
        let gateway = JobGateway::new(store.clone()).with_retry_delay(Duration::from_secs(10_000_000_000_000));
        let id = store.enqueue(&t1(), NewJob::new("health_check", json!({})));
        gateway.get_next_job(&t1(), &"w1".into(), None).await.unwrap();

        assert!(!gateway.retry_job(&t1(), &id, None).await);
        assert_eq!(store.get_job(&t1(), &id).unwrap().status, JobStatus::Leased);
        assert!(logs_contain("error retrying job"));
    }

    #[tokio::test]
    #[traced_test]
    async fn store_outage_degrades_to_negative_results() {
        let (store, gateway) = setup();
        let id = store.enqueue(&t1(), NewJob::new("health_check", json!({})));
        store.set_unavailable(true);

        assert!(gateway.get_next_job(&t1(), &"w1".into(), None).await.is_none());
        assert!(!gateway.complete_job(&t1(), &id, CompletionStatus::Succeeded, None, None).await);
        assert!(!gateway.retry_job(&t1(), &id, None).await);
        assert!(!gateway.update_heartbeat(&t1(), &id, &"w1".into()).await);

        assert!(logs_contain("error getting next job"));
        assert!(logs_contain("job store unavailable"));
    }
}
