//! # relay-queue: multi-tenant job processing
//!
//! Workers pull jobs through a [`JobGateway`], run them with a
//! [`JobExecutor`], and report back with `complete` or `retry`. The durable
//! store behind the gateway is a [`JobStore`]: [`MemoryJobStore`] for tests
//! and development, `PgJobStore` (feature `postgres`) in production.
//!
//! Every store operation takes the caller's [`TenantContext`]; jobs owned by
//! another tenant behave as if they did not exist.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relay_queue::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() {
//! let store = Arc::new(MemoryJobStore::new());
//! let tenant = TenantContext::new("t1");
//! store.enqueue(&tenant, NewJob::new("health_check", json!({})));
//!
//! let worker = JobWorker::new("w1", JobGateway::new(store), JobExecutor::builtin());
//! let outcome = worker.process_next(&tenant, None).await;
//! assert!(matches!(outcome, WorkOutcome::Succeeded(_)));
//! # }
//! ```
//!
//! [`TenantContext`]: relay_core::TenantContext

pub mod backend;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod job;
pub mod tenant;
pub mod types;
pub mod worker;

pub use backend::memory::MemoryJobStore;
pub use backend::JobStore;
pub use error::{JobError, QueueError, QueueResult};
pub use execution::JobExecutor;
pub use gateway::{JobGateway, DEFAULT_RETRY_DELAY};
pub use job::{Job, JobHandler, JobKind, JobRegistry};
pub use tenant::{set_tenant_context, TenantScope};
pub use types::{CompletionStatus, JobCompletion, JobId, JobRecord, JobStatus, NewJob, WorkerId};
pub use worker::{JobWorker, WorkOutcome};

#[cfg(feature = "postgres")]
pub use backend::postgres::{PgJobStore, PgStoreConfig};

pub mod prelude {
    pub use crate::{
        CompletionStatus, Job, JobError, JobExecutor, JobGateway, JobId, JobKind, JobRecord,
        JobRegistry, JobStatus, JobStore, JobWorker, MemoryJobStore, NewJob, QueueError,
        QueueResult, WorkOutcome, WorkerId,
    };

    pub use async_trait::async_trait;
    pub use relay_core::TenantContext;
}
