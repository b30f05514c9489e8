//! Server configuration loaded from environment variables.
//!
//! Everything except the signing secret has a default, so a local instance
//! only needs `QUILL_JWT_SECRET` set.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use quill_api::token::DEFAULT_TOKEN_TTL_HOURS;
use tracing::warn;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "quill=debug,quill_api=debug,quill_db=debug,tower_http=debug";

/// Signing secrets shipped in sample files. Refused at startup.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `QUILL_HOST`, default `0.0.0.0`
    pub host: String,

    /// Env: `QUILL_PORT`, default `5000`
    pub port: u16,

    /// Env: `QUILL_DB_PATH`, default `quill.db`
    pub db_path: PathBuf,

    /// Env: `QUILL_JWT_SECRET`. No default.
    pub jwt_secret: String,

    /// Env: `QUILL_UPLOAD_DIR`, default `./uploads`
    pub upload_dir: PathBuf,

    /// Request body cap, uploads included.
    /// Env: `QUILL_MAX_UPLOAD_BYTES`, default 10 MiB
    pub max_body_bytes: usize,

    /// Env: `QUILL_TOKEN_TTL_HOURS`, default 24
    pub token_ttl_hours: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            db_path: PathBuf::from("quill.db"),
            jwt_secret: String::new(),
            upload_dir: PathBuf::from("./uploads"),
            max_body_bytes: 10 * 1024 * 1024,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values are logged
    /// and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("QUILL_HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("QUILL_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %port, "Invalid QUILL_PORT, using default"),
            }
        }

        if let Some(path) = lookup("QUILL_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(secret) = lookup("QUILL_JWT_SECRET") {
            config.jwt_secret = secret;
        }

        if let Some(dir) = lookup("QUILL_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }

        if let Some(val) = lookup("QUILL_MAX_UPLOAD_BYTES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_body_bytes = n,
                _ => warn!(value = %val, "Invalid QUILL_MAX_UPLOAD_BYTES, using default"),
            }
        }

        if let Some(val) = lookup("QUILL_TOKEN_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 && ttl_in_range(n) => config.token_ttl_hours = n,
                _ => warn!(value = %val, "Invalid QUILL_TOKEN_TTL_HOURS, using default"),
            }
        }

        config
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::try_hours(self.token_ttl_hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_TTL_HOURS))
    }

    pub fn has_usable_secret(&self) -> bool {
        !self.jwt_secret.trim().is_empty() && !PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// A lifetime is usable if it fits a `Duration` and tokens issued now
/// still get a representable expiry.
fn ttl_in_range(hours: i64) -> bool {
    Duration::try_hours(hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .is_some()
}
