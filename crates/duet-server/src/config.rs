use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub db_readers: usize,
    pub storage_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("DUET_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DUET_JWT_SECRET is unset or still a placeholder; it must match the identity service's secret");
        }

        let host = lookup("DUET_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("DUET_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("DUET_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        let db_path = lookup("DUET_DB_PATH").unwrap_or_else(|| "duet.db".into()).into();

        let db_readers: usize = lookup("DUET_DB_READERS")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("DUET_DB_READERS must be a number")?
            .unwrap_or(4);

        let timeout_ms: u64 = lookup("DUET_STORAGE_TIMEOUT_MS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("DUET_STORAGE_TIMEOUT_MS must be a number of milliseconds")?
            .unwrap_or(5000);

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            db_readers,
            storage_timeout: Duration::from_millis(timeout_ms.max(1)),
        })
    }
}
