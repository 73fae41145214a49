//! Server settings, read from a [`RelayConfig`] after `.env` and
//! `RELAY__*` variables have been loaded into it.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use relay_core::RelayConfig;

pub const ENV_PREFIX: &str = "RELAY__";

/// Largest retry delay the stores accept (the Postgres function takes an `int4`).
pub const MAX_RETRY_DELAY_SECS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub retry_delay: Duration,
    pub tenant_setting: String,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Fill in defaults for every key the server reads.
pub fn apply_defaults(config: &mut RelayConfig) {
    config.set_default("http.host", "127.0.0.1");
    config.set_default("http.port", "3040");
    config.set_default("http.path", "/process-jobs");
    config.set_default("store.backend", "memory");
    config.set_default("database.max_connections", "10");
    config.set_default("queue.retry_delay_secs", "60");
    config.set_default("tenant.setting", "app.current_tenant_id");
    config.set_default("log.format", "pretty");
}

/// `.env`, then the process environment, then defaults.
pub fn load() -> Result<ServerConfig> {
    dotenvy::dotenv().ok();

    let mut config = RelayConfig::new();
    config.load_env(ENV_PREFIX);
    from_config(config)
}

pub fn from_config(mut config: RelayConfig) -> Result<ServerConfig> {
    apply_defaults(&mut config);
    let snapshot = config.snapshot();

    let port = snapshot
        .get("http.port")
        .and_then(|p| p.trim().parse::<u16>().ok())
        .ok_or_else(|| anyhow!("http.port must be a port number"))?;

    let backend = match snapshot.get_or("store.backend", "memory").as_str() {
        "memory" => StoreBackend::Memory,
        "postgres" => StoreBackend::Postgres,
        other => bail!("unknown store.backend: {other} (expected memory or postgres)"),
    };

    let database_url = snapshot.get_string("database.url").filter(|url| !url.is_empty());
    if backend == StoreBackend::Postgres && database_url.is_none() {
        bail!("database.url is required when store.backend is postgres");
    }

    let log_format = match snapshot.get_or("log.format", "pretty").as_str() {
        "json" => LogFormat::Json,
        "pretty" => LogFormat::Pretty,
        other => bail!("unknown log.format: {other} (expected pretty or json)"),
    };

    let mut path = snapshot.get_or("http.path", "/process-jobs");
    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    let retry_delay_secs = snapshot
        .get_u64("queue.retry_delay_secs")
        .ok_or_else(|| anyhow!("queue.retry_delay_secs must be a number"))?;
    if retry_delay_secs > MAX_RETRY_DELAY_SECS {
        bail!("queue.retry_delay_secs must be at most {MAX_RETRY_DELAY_SECS}, got {retry_delay_secs}");
    }

    Ok(ServerConfig {
        host: snapshot.get_or("http.host", "127.0.0.1"),
        port,
        path,
        backend,
        database_url,
        max_connections: snapshot
            .get_u32("database.max_connections")
            .ok_or_else(|| anyhow!("database.max_connections must be a number"))?,
        retry_delay: Duration::from_secs(retry_delay_secs),
        tenant_setting: snapshot.get_or("tenant.setting", "app.current_tenant_id"),
        log_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> RelayConfig {
        let mut config = RelayConfig::new();
        config.load_vars(
            ENV_PREFIX,
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        );
        config
    }

    #[test]
    fn defaults() {
        let config = from_config(RelayConfig::new()).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:3040");
        assert_eq!(config.path, "/process-jobs");
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.retry_delay, Duration::from_secs(60));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.tenant_setting, "app.current_tenant_id");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn env_overrides() {
        let config = from_config(vars(&[
            ("RELAY__HTTP__PORT", "8080"),
            ("RELAY__HTTP__PATH", "jobs"),
            ("RELAY__QUEUE__RETRY_DELAY_SECS", "15"),
            ("RELAY__LOG__FORMAT", "json"),
            ("OTHER__HTTP__PORT", "1"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/jobs");
        assert_eq!(config.retry_delay, Duration::from_secs(15));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn postgres_needs_a_url() {
        let err = from_config(vars(&[("RELAY__STORE__BACKEND", "postgres")])).unwrap_err();
        assert!(err.to_string().contains("database.url"));

        let config = from_config(vars(&[
            ("RELAY__STORE__BACKEND", "postgres"),
            ("RELAY__DATABASE__URL", "postgres://localhost/relay"),
        ]))
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Postgres);
    }

    #[test]
    fn rejects_garbage() {
        assert!(from_config(vars(&[("RELAY__HTTP__PORT", "eighty")])).is_err());
        assert!(from_config(vars(&[("RELAY__STORE__BACKEND", "redis")])).is_err());
        assert!(from_config(vars(&[("RELAY__LOG__FORMAT", "xml")])).is_err());
    }

    #[test]
    fn retry_delay_is_bounded() {
        let config = from_config(vars(&[("RELAY__QUEUE__RETRY_DELAY_SECS", "2147483647")])).unwrap();
        assert_eq!(config.retry_delay, Duration::from_secs(MAX_RETRY_DELAY_SECS));

        let err = from_config(vars(&[("RELAY__QUEUE__RETRY_DELAY_SECS", "2147483648")])).unwrap_err();
        assert!(err.to_string().contains("queue.retry_delay_secs"));
        assert!(from_config(vars(&[("RELAY__QUEUE__RETRY_DELAY_SECS", "10000000000000")])).is_err());
    }
}
