pub mod config;
pub mod logging;

use std::sync::Arc;

use anyhow::Result;
use relay_axum::{relay, RelayApp, RelayState};
use relay_queue::{JobGateway, JobStore, MemoryJobStore};
use tracing::{info, warn};

use crate::config::{ServerConfig, StoreBackend};

/// Open the configured job store.
pub async fn connect_store(config: &ServerConfig) -> Result<Arc<dyn JobStore>> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("using the in-memory job store; jobs are lost on restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        StoreBackend::Postgres => connect_postgres(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(config: &ServerConfig) -> Result<Arc<dyn JobStore>> {
    use relay_queue::{PgJobStore, PgStoreConfig};

    let url = config
        .database_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("database.url is required for the postgres store"))?;
    let mut pg = PgStoreConfig::new(url);
    pg.max_connections = config.max_connections;
    pg.tenant_setting = config.tenant_setting.clone();

    Ok(Arc::new(PgJobStore::connect(&pg).await?))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_config: &ServerConfig) -> Result<Arc<dyn JobStore>> {
    anyhow::bail!("store.backend is postgres but relay-server was built without the `postgres` feature")
}

/// The HTTP app over `store`.
pub fn build(config: &ServerConfig, store: Arc<dyn JobStore>) -> RelayApp {
    let gateway = JobGateway::new(store).with_retry_delay(config.retry_delay);
    info!(
        path = %config.path,
        retry_delay_secs = config.retry_delay.as_secs(),
        "mounting process-jobs endpoint"
    );

    relay(RelayState::new(gateway))
        .process_jobs(&config.path)
        .use_get("/health", || async { "ok" })
}
