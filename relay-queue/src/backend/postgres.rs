//! PostgreSQL job store.
//!
//! Talks to the job table through its SQL functions:
//! `get_next_job(p_tenant_id, p_worker_id, p_job_family)`,
//! `complete_job(p_job_id, p_status, p_output_data, p_error_data)` and
//! `retry_job(p_job_id, p_delay_seconds)`. Heartbeats are a plain row update.
//! Each call runs in its own transaction with the tenant written to
//! [`TenantScope::setting`] first, so row-level security sees it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::TenantContext;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::{
    backend::JobStore, tenant::TenantScope, JobCompletion, JobId, JobRecord, JobStatus,
    QueueError, QueueResult, WorkerId,
};

const JOB_COLUMNS: &str = "id::text AS id, tenant_id::text AS tenant_id, job_family, job_name, \
     COALESCE(input_data, '{}'::jsonb) AS input_data, status::text AS status, worker_id, \
     worker_heartbeat, output_data, error_data, created_at, updated_at";

/// Only a live lease takes a heartbeat; the status names are the ones that
/// read back as [`JobStatus::Leased`].
const HEARTBEAT_SQL: &str = "UPDATE jobs SET worker_heartbeat = NOW(), updated_at = NOW() \
     WHERE id::text = $1 AND worker_id = $2 AND tenant_id::text = $3 \
     AND status::text IN ('leased', 'running')";

#[derive(Debug, sqlx::FromRow)]
struct PgJobRow {
    id: String,
    tenant_id: String,
    job_family: Option<String>,
    job_name: String,
    input_data: Value,
    status: String,
    worker_id: Option<String>,
    worker_heartbeat: Option<DateTime<Utc>>,
    output_data: Option<Value>,
    error_data: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PgJobRow> for JobRecord {
    type Error = QueueError;

    fn try_from(row: PgJobRow) -> Result<Self, Self::Error> {
        Ok(JobRecord {
            id: JobId(row.id),
            tenant_id: row.tenant_id,
            job_family: row.job_family,
            job_name: row.job_name,
            input_data: row.input_data,
            status: row.status.parse::<JobStatus>()?,
            worker_id: row.worker_id,
            worker_heartbeat: row.worker_heartbeat,
            output_data: row.output_data,
            error_data: row.error_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Pool settings for [`PgJobStore::connect`].
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub tenant_setting: String,
}

impl PgStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            tenant_setting: crate::tenant::DEFAULT_TENANT_SETTING.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
    scope: TenantScope,
}

impl PgJobStore {
    pub fn new(pool: PgPool, scope: TenantScope) -> Self {
        Self { pool, scope }
    }

    pub async fn connect(config: &PgStoreConfig) -> QueueResult<Self> {
        info!(
            max_connections = config.max_connections,
            tenant_setting = %config.tenant_setting,
            "connecting job store to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        Ok(Self::new(pool, TenantScope::new(config.tenant_setting.clone())))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    /// Each operation re-applies the tenant inside its own transaction; this
    /// only checks that the server accepts the setting for this tenant.
    async fn set_tenant_context(&self, ctx: &TenantContext) -> QueueResult<()> {
        let mut tx = self.pool.begin().await?;
        self.scope.apply(&mut tx, ctx).await?;
        tx.rollback().await?;
        Ok(())
    }

    async fn get_next_job(
        &self,
        ctx: &TenantContext,
        worker_id: &WorkerId,
        job_family: Option<&str>,
    ) -> QueueResult<Option<JobRecord>> {
        let mut tx = self.pool.begin().await?;
        self.scope.apply(&mut tx, ctx).await?;

        let sql = format!("SELECT {JOB_COLUMNS} FROM get_next_job($1, $2, $3) LIMIT 1");
        let row = sqlx::query_as::<_, PgJobRow>(&sql)
            .bind(ctx.tenant())
            .bind(worker_id.as_str())
            .bind(job_family)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        row.map(JobRecord::try_from).transpose()
    }

    async fn complete_job(
        &self,
        ctx: &TenantContext,
        job_id: &JobId,
        completion: JobCompletion,
    ) -> QueueResult<()> {
        let mut tx = self.pool.begin().await?;
        self.scope.apply(&mut tx, ctx).await?;
        ensure_owned(&mut tx, ctx, job_id).await?;

        sqlx::query("SELECT complete_job($1::uuid, $2, $3, $4)")
            .bind(job_id.as_str())
            .bind(completion.status.as_str())
            .bind(&completion.output_data)
            .bind(&completion.error_data)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn retry_job(&self, ctx: &TenantContext, job_id: &JobId, delay: Duration) -> QueueResult<bool> {
        let delay_seconds = i32::try_from(delay.as_secs())
            .map_err(|_| QueueError::Internal(format!("retry delay too large: {delay:?}")))?;

        let mut tx = self.pool.begin().await?;
        self.scope.apply(&mut tx, ctx).await?;
        ensure_owned(&mut tx, ctx, job_id).await?;

        let scheduled: Option<bool> = sqlx::query_scalar("SELECT retry_job($1::uuid, $2)")
            .bind(job_id.as_str())
            .bind(delay_seconds)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(scheduled.unwrap_or(false))
    }

    async fn update_heartbeat(
        &self,
        ctx: &TenantContext,
        job_id: &JobId,
        worker_id: &WorkerId,
    ) -> QueueResult<u64> {
        let mut tx = self.pool.begin().await?;
        self.scope.apply(&mut tx, ctx).await?;

        let result = sqlx::query(HEARTBEAT_SQL)
            .bind(job_id.as_str())
            .bind(worker_id.as_str())
            .bind(ctx.tenant())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Fail with `JobNotFound` unless `job_id` belongs to `ctx`'s tenant.
async fn ensure_owned(
    conn: &mut sqlx::PgConnection,
    ctx: &TenantContext,
    job_id: &JobId,
) -> QueueResult<()> {
    let owned: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM jobs WHERE id::text = $1 AND tenant_id::text = $2)",
    )
    .bind(job_id.as_str())
    .bind(ctx.tenant())
    .fetch_one(conn)
    .await?;

    if !owned {
        return Err(QueueError::JobNotFound(job_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str) -> PgJobRow {
        PgJobRow {
            id: "5f0c3c1e-0000-4000-8000-000000000042".to_string(),
            tenant_id: "t1".to_string(),
            job_family: Some("emails".to_string()),
            job_name: "email_send".to_string(),
            input_data: json!({"to": "a@example.com"}),
            status: status.to_string(),
            worker_id: Some("w1".to_string()),
            worker_heartbeat: Some(Utc::now()),
            output_data: None,
            error_data: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rows_map_store_status_names() {
        let record = JobRecord::try_from(row("running")).unwrap();
        assert_eq!(record.status, JobStatus::Leased);
        assert_eq!(record.job_family.as_deref(), Some("emails"));

        assert!(JobRecord::try_from(row("archived")).is_err());
    }

    #[test]
    fn heartbeat_update_is_limited_to_leased_rows() {
        for name in ["leased", "running"] {
            assert!(HEARTBEAT_SQL.contains(&format!("'{name}'")));
            assert_eq!(name.parse::<JobStatus>().unwrap(), JobStatus::Leased);
        }
        for name in ["queued", "pending", "succeeded", "failed", "retry_scheduled", "retrying"] {
            assert!(!HEARTBEAT_SQL.contains(&format!("'{name}'")));
        }
    }

    #[test]
    fn config_defaults() {
        let config = PgStoreConfig::new("postgres://localhost/relay");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.tenant_setting, "app.current_tenant_id");
    }
}
