//! Contract tests for the gateway over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::json;

use relay_core::TenantContext;
use relay_queue::{
    CompletionStatus, JobGateway, JobId, JobStatus, MemoryJobStore, NewJob, WorkerId,
};

fn tenant(id: &str) -> TenantContext {
    TenantContext::new(id)
}

fn email_job() -> NewJob {
    NewJob::new("email_send", json!({"to": ["a@example.com"]})).with_family("emails")
}

fn setup() -> (Arc<MemoryJobStore>, JobGateway) {
    let store = Arc::new(MemoryJobStore::new());
    let gateway = JobGateway::new(store.clone());
    (store, gateway)
}

/// Many workers racing for one job: exactly one wins.
#[tokio::test]
async fn concurrent_get_next_leases_a_job_once() {
    let (store, gateway) = setup();
    let job_id = store.enqueue(&tenant("t1"), email_job());

    let attempts = (0..16).map(|i| {
        let gateway = gateway.clone();
        async move {
            let worker = WorkerId::from(format!("w{i}"));
            gateway.get_next_job(&tenant("t1"), &worker, Some("emails")).await
        }
    });
    let winners: Vec<_> = join_all(attempts).await.into_iter().flatten().collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].id, job_id);
    assert_eq!(store.attempts(&job_id), Some(1));
}

/// Heartbeat from the holder touches only its own job.
#[tokio::test]
async fn heartbeat_touches_only_the_held_job() {
    let (store, gateway) = setup();
    let t1 = tenant("t1");
    let first = store.enqueue(&t1, email_job());
    let second = store.enqueue(&t1, email_job());

    gateway.get_next_job(&t1, &"w1".into(), None).await.unwrap();
    gateway.get_next_job(&t1, &"w2".into(), None).await.unwrap();
    let before = store.get_job(&t1, &first).unwrap();
    let untouched = store.get_job(&t1, &second).unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(gateway.update_heartbeat(&t1, &first, &"w1".into()).await);

    let refreshed = store.get_job(&t1, &first).unwrap();
    assert!(refreshed.worker_heartbeat > before.worker_heartbeat);
    assert!(refreshed.updated_at > before.updated_at);
    assert_eq!(refreshed.status, JobStatus::Leased);
    assert_eq!(store.get_job(&t1, &second).unwrap(), untouched);
}

#[tokio::test]
async fn wrong_worker_heartbeat_is_rejected_quietly() {
    let (store, gateway) = setup();
    let t1 = tenant("t1");
    let job_id = store.enqueue(&t1, email_job());
    gateway.get_next_job(&t1, &"w1".into(), None).await.unwrap();

    assert!(!gateway.update_heartbeat(&t1, &job_id, &"w2".into()).await);
    assert!(!gateway.update_heartbeat(&t1, &JobId::from("missing"), &"w1".into()).await);
}

/// queued -> leased -> retry_scheduled -> queued -> leased -> failed
#[tokio::test]
async fn full_lifecycle_through_a_retry() {
    let (store, gateway) = setup();
    let t1 = tenant("t1");
    let job_id = store.enqueue(&t1, email_job());

    gateway.get_next_job(&t1, &"w1".into(), Some("emails")).await.unwrap();
    assert!(gateway.retry_job(&t1, &job_id, Some(Duration::from_secs(30))).await);
    assert!(gateway.get_next_job(&t1, &"w2".into(), Some("emails")).await.is_none());

    store.expire_retry_delay(&job_id).unwrap();
    assert_eq!(store.get_job(&t1, &job_id).unwrap().status, JobStatus::Queued);

    let job = gateway.get_next_job(&t1, &"w2".into(), Some("emails")).await.unwrap();
    assert_eq!(job.worker_id.as_deref(), Some("w2"));

    assert!(
        gateway
            .complete_job(&t1, &job_id, CompletionStatus::Failed, None, Some(json!({"error": "smtp down"})))
            .await
    );
    let job = store.get_job(&t1, &job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_data, Some(json!({"error": "smtp down"})));
    assert_eq!(job.output_data, None);
    assert_eq!(store.attempts(&job_id), Some(2));
}

#[tokio::test]
async fn completing_twice_fails_the_second_time() {
    let (store, gateway) = setup();
    let t1 = tenant("t1");
    let job_id = store.enqueue(&t1, email_job());
    gateway.get_next_job(&t1, &"w1".into(), None).await.unwrap();

    assert!(gateway.complete_job(&t1, &job_id, CompletionStatus::Succeeded, None, None).await);
    assert!(!gateway.complete_job(&t1, &job_id, CompletionStatus::Failed, None, None).await);
    assert_eq!(store.get_job(&t1, &job_id).unwrap().output_data, Some(json!({})));
}

#[tokio::test]
async fn tenants_never_see_each_others_jobs() {
    let (store, gateway) = setup();
    store.enqueue(&tenant("t1"), email_job());

    assert!(gateway.get_next_job(&tenant("t2"), &"w1".into(), None).await.is_none());
    assert!(gateway.get_next_job(&tenant("t1"), &"w1".into(), None).await.is_some());
    assert_eq!(store.tenant_contexts(), vec!["t2".to_string(), "t1".to_string()]);
}
