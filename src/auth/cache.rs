//! Persisted token cache.
//!
//! One JSON file per (tenant, client) pair under the cache directory, named
//! by the SHA-256 of the identity so the tenant id never appears in a file
//! listing. Files are written user-only (0o600). Writes for the same
//! identity are serialized by an in-process lock.

use crate::error::{MigrationError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// A cached token set, mirroring the persisted JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_on: DateTime<Utc>,
    pub scopes: Vec<String>,
}

impl CachedToken {
    /// Valid means the expiry is at least `skew_minutes` away.
    pub fn is_valid(&self, skew_minutes: i64) -> bool {
        self.expires_on > Utc::now() + ChronoDuration::minutes(skew_minutes)
    }
}

/// File-backed token cache scoped to the invoking user.
pub struct TokenCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl TokenCache {
    /// Cache under `dir`, typically `$TOKEN_CACHE_DIR` or the platform cache
    /// directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Platform default: `<cache_dir>/pmo-migrator/tokens`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pmo-migrator")
            .join("tokens")
    }

    fn entry_path(&self, tenant_id: &str, client_id: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_bytes());
        hasher.update(b":");
        hasher.update(client_id.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    /// Load the cached token for an identity, if present and parseable.
    pub async fn load(&self, tenant_id: &str, client_id: &str) -> Option<CachedToken> {
        let path = self.entry_path(tenant_id, client_id);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "discarding unreadable token cache entry");
                None
            }
        }
    }

    /// Persist a token for an identity, creating the directory as needed.
    pub async fn store(
        &self,
        tenant_id: &str,
        client_id: &str,
        token: &CachedToken,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            MigrationError::config(format!(
                "cannot create token cache directory {}: {e}",
                self.dir.display()
            ))
        })?;
        let path = self.entry_path(tenant_id, client_id);
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| MigrationError::config(format!("token serialization failed: {e}")))?;
        std::fs::write(&path, json).map_err(|e| {
            MigrationError::config(format!("cannot write token cache {}: {e}", path.display()))
        })?;
        restrict_permissions(&path);
        Ok(())
    }

    /// Remove the entry for one identity.
    pub async fn clear(&self, tenant_id: &str, client_id: &str) {
        let _guard = self.write_lock.lock().await;
        let path = self.entry_path(tenant_id, client_id);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), %err, "failed to remove token cache entry");
            }
        }
    }

    /// Remove every cached entry.
    pub async fn clear_all(&self) {
        let _guard = self.write_lock.lock().await;
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), %err, "failed to restrict token file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
