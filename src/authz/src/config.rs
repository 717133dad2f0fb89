//! Runtime configuration
//!
//! Defaults suit local development. [`AuthzConfig::from_env`] overlays
//! environment variables, [`AuthzConfig::from_json_file`] loads a full
//! document.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `HOST` | `server.host` | `0.0.0.0` |
//! | `PORT` | `server.port` | `8080` |
//! | `METRICS_PORT` | `server.metrics_port` | `9090` |
//! | `CACHE_ENABLED` | `cache.enabled` | `true` |
//! | `CACHE_SIZE` | `cache.capacity` | `10000` |
//! | `CACHE_TTL` | `cache.ttl` (seconds) | `300` |
//! | `AUDIT_ENABLED` | `audit.enabled` | `true` |
//! | `AUDIT_CAPACITY` | `audit.capacity` | `10000` |
//! | `RESOURCE_PATHS` | `resource_paths` (`doc=/docs/,app=/apps/`) | empty |
//! | `DATABASE_URL` | `database_url` | unset |
//! | `SEED_FILE` | `seed_file` | unset |

use crate::error::{AuthzError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Access API port
    pub port: u16,

    /// Prometheus metrics port
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            metrics_port: 9090,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.host, self.metrics_port)
    }
}

/// Effective-permission cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable caching of effective permissions
    pub enabled: bool,

    /// Maximum number of `(account, tenant)` entries
    pub capacity: usize,

    /// Time-to-live for cached entries
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record access checks and soft tenant mismatches
    pub enabled: bool,

    /// Entries kept before the oldest are dropped
    pub capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub audit: AuditConfig,

    /// Permission resource name → request path prefix
    pub resource_paths: BTreeMap<String, String>,

    /// PostgreSQL connection string (feature `postgres`)
    pub database_url: Option<String>,

    /// JSON snapshot loaded into the in-memory repository
    pub seed_file: Option<PathBuf>,
}

impl AuthzConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Load a full JSON configuration document
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&raw).map_err(|e| {
            AuthzError::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }
        if let Some(port) = lookup("METRICS_PORT") {
            self.server.metrics_port = parse_var("METRICS_PORT", &port)?;
        }
        if let Some(enabled) = lookup("CACHE_ENABLED") {
            self.cache.enabled = parse_var("CACHE_ENABLED", &enabled)?;
        }
        if let Some(size) = lookup("CACHE_SIZE") {
            self.cache.capacity = parse_var("CACHE_SIZE", &size)?;
        }
        if let Some(ttl) = lookup("CACHE_TTL") {
            self.cache.ttl = Duration::from_secs(parse_var("CACHE_TTL", &ttl)?);
        }
        if let Some(enabled) = lookup("AUDIT_ENABLED") {
            self.audit.enabled = parse_var("AUDIT_ENABLED", &enabled)?;
        }
        if let Some(capacity) = lookup("AUDIT_CAPACITY") {
            self.audit.capacity = parse_var("AUDIT_CAPACITY", &capacity)?;
        }
        if let Some(paths) = lookup("RESOURCE_PATHS") {
            self.resource_paths = parse_resource_paths(&paths)?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(seed) = lookup("SEED_FILE") {
            self.seed_file = Some(PathBuf::from(seed));
        }

        Ok(self)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AuthzError::Config(format!("invalid value for {}: {:?}", key, value)))
}

/// Parse `name=prefix` pairs separated by commas
pub fn parse_resource_paths(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut paths = BTreeMap::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, prefix) = pair.split_once('=').ok_or_else(|| {
            AuthzError::Config(format!("resource path must be 'name=prefix', got {:?}", pair))
        })?;

        let (name, prefix) = (name.trim(), prefix.trim());
        if name.is_empty() || prefix.is_empty() {
            return Err(AuthzError::Config(format!("empty resource path entry: {:?}", pair)));
        }

        paths.insert(name.to_string(), prefix.to_string());
    }

    Ok(paths)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
