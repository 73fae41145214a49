//! Tenant context setter.
//!
//! Before a lease the gateway asks the store to scope itself to the caller's
//! tenant. The call is fire-and-forget: a failure is logged and the lease is
//! still attempted. Isolation does not hinge on it, since every store
//! operation also receives the tenant explicitly.

use relay_core::TenantContext;
use tracing::{debug, warn};

use crate::{backend::JobStore, QueueError, QueueResult};

/// Session setting that carries the active tenant on Postgres connections.
pub const DEFAULT_TENANT_SETTING: &str = "app.current_tenant_id";

/// Name of the store-side setting the tenant id is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    setting: String,
}

impl TenantScope {
    pub fn new(setting: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
        }
    }

    pub fn setting(&self) -> &str {
        &self.setting
    }

    /// Reject tenant ids that cannot be written to a session setting.
    pub fn validate(ctx: &TenantContext) -> QueueResult<()> {
        let tenant = ctx.tenant();
        if tenant.trim().is_empty() {
            return Err(QueueError::InvalidTenant("tenant id is empty".to_string()));
        }
        if tenant.chars().any(char::is_control) {
            return Err(QueueError::InvalidTenant(
                "tenant id contains control characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Write the tenant into the current transaction (`set_config(.., true)`).
    #[cfg(feature = "postgres")]
    pub async fn apply(&self, conn: &mut sqlx::PgConnection, ctx: &TenantContext) -> QueueResult<()> {
        Self::validate(ctx)?;
        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(&self.setting)
            .bind(ctx.tenant())
            .execute(conn)
            .await?;
        Ok(())
    }
}

impl Default for TenantScope {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT_SETTING)
    }
}

/// Ask `store` to scope itself to `ctx`. Never fails; returns whether the
/// store accepted the tenant.
pub async fn set_tenant_context<S>(store: &S, ctx: &TenantContext) -> bool
where
    S: JobStore + ?Sized,
{
    match store.set_tenant_context(ctx).await {
        Ok(()) => {
            debug!(tenant_id = %ctx.tenant_id, store = store.name(), "tenant context set");
            true
        }
        Err(e) => {
            warn!(tenant_id = %ctx.tenant_id, store = store.name(), error = %e, "failed to set tenant context");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryJobStore;

    #[test]
    fn validate_rejects_blank_and_control_characters() {
        assert!(TenantScope::validate(&TenantContext::new("t1")).is_ok());
        assert!(TenantScope::validate(&TenantContext::new("  ")).is_err());
        assert!(TenantScope::validate(&TenantContext::new("t1\0")).is_err());
    }

    #[test]
    fn default_setting_name() {
        assert_eq!(TenantScope::default().setting(), "app.current_tenant_id");
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let store = MemoryJobStore::new();
        assert!(set_tenant_context(&store, &TenantContext::new("t1")).await);

        store.set_fail_tenant_context(true);
        assert!(!set_tenant_context(&store, &TenantContext::new("t2")).await);
        assert_eq!(store.tenant_contexts(), vec!["t1".to_string(), "t2".to_string()]);
    }
}
