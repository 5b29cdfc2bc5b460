//! Credential Vault
//!
//! Uniform read access to secrets regardless of deployment target.
//! Backends are polymorphic over get/list/set/delete; values are cached
//! in memory with a per-key TTL. `get` never logs the value; structured
//! logs carry only the key and a source tag.

mod cloud;
mod env_file;

pub use cloud::CloudSecretBackend;
pub use env_file::EnvFileBackend;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::config::{CredentialBackendKind, CredentialsConfig};
use crate::types::{PressError, Result};

// =============================================================================
// Backend Contract
// =============================================================================

/// Pluggable secret backend
#[async_trait]
pub trait VaultBackend: Send + Sync {
    /// Fetch a secret value; `Ok(None)` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<SecretString>>;

    /// List available key names (never values)
    async fn list(&self) -> Result<Vec<String>>;

    /// Store a secret value
    async fn set(&self, key: &str, value: SecretString) -> Result<()>;

    /// Remove a secret
    async fn delete(&self, key: &str) -> Result<()>;

    /// Source tag for structured logs
    fn source(&self) -> &'static str;
}

/// Shared backend handle
pub type SharedBackend = Arc<dyn VaultBackend>;

/// Create a backend from configuration
pub fn create_backend(config: &CredentialsConfig) -> Result<SharedBackend> {
    match config.backend {
        CredentialBackendKind::EnvFile => {
            let path = config.path.clone().ok_or_else(|| {
                PressError::Config("credentials.path is required for env_file".to_string())
            })?;
            Ok(Arc::new(EnvFileBackend::new(path)))
        }
        CredentialBackendKind::CloudSecretManager => {
            let backend = CloudSecretBackend::new(
                config.project_id.clone().ok_or_else(|| {
                    PressError::Config("credentials.project_id is required".to_string())
                })?,
                config.secret_name.clone().ok_or_else(|| {
                    PressError::Config("credentials.secret_name is required".to_string())
                })?,
                config.region.clone(),
            )?;
            Ok(Arc::new(backend))
        }
    }
}

// =============================================================================
// TTL Cache
// =============================================================================

struct CacheEntry {
    value: SecretString,
    cached_at: Instant,
}

/// Cache hit/miss counters for observability
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultCacheStats {
    pub hits: u64,
    pub misses: u64,
}

// =============================================================================
// Vault
// =============================================================================

/// Read-only secret accessor with a TTL cache in front of the backend.
///
/// Cache hits are sub-millisecond; misses are bounded by the backend.
/// When the backend is unreachable, a cached value (even expired) is
/// served rather than failing; `VaultUnavailable` is returned only when
/// the backend is unreachable AND nothing is cached.
pub struct CredentialVault {
    backend: SharedBackend,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CredentialVault {
    pub fn new(backend: SharedBackend, ttl: Duration) -> Self {
        Self {
            backend,
            cache: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Construct from configuration
    pub fn from_config(config: &CredentialsConfig) -> Result<Self> {
        let backend = create_backend(config)?;
        Ok(Self::new(
            backend,
            Duration::from_secs(config.cache_ttl_seconds),
        ))
    }

    /// Fetch a credential value. Never logs the value.
    pub async fn get(&self, key: &str) -> Result<SecretString> {
        if let Some(entry) = self.cache.get(key)
            && entry.cached_at.elapsed() < self.ttl
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, source = "cache", "credential served");
            return Ok(entry.value.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        match self.backend.get(key).await {
            Ok(Some(value)) => {
                debug!(key, source = self.backend.source(), "credential fetched");
                self.cache.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        cached_at: Instant::now(),
                    },
                );
                Ok(value)
            }
            Ok(None) => Err(PressError::CredentialMissing(key.to_string())),
            Err(err) => {
                // Serve a stale cached value over failing outright.
                if let Some(entry) = self.cache.get(key) {
                    warn!(
                        key,
                        source = self.backend.source(),
                        "backend unreachable, serving cached credential"
                    );
                    return Ok(entry.value.clone());
                }
                Err(PressError::VaultUnavailable(err.to_string()))
            }
        }
    }

    /// List credential names (never values)
    pub async fn list(&self) -> Result<Vec<String>> {
        self.backend.list().await
    }

    /// Clear one cache entry, or all when `key` is None
    pub fn invalidate(&self, key: Option<&str>) {
        match key {
            Some(k) => {
                self.cache.remove(k);
            }
            None => self.cache.clear(),
        }
    }

    pub fn cache_stats(&self) -> VaultCacheStats {
        VaultCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
