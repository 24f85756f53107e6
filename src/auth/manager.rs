//! OAuth token acquisition for the source tenant.
//!
//! Attempt order: in-memory token (5-minute expiry skew), persisted cache,
//! refresh-token exchange, interactive device-code flow. A failed refresh
//! purges the cache entry and falls through to a fresh device-code prompt.
//! Device-code failures are fatal to the current call and are never retried
//! by the retry engine.

use crate::auth::cache::{CachedToken, TokenCache};
use crate::auth::display::DeviceCodeDisplay;
use crate::error::{AuthErrorKind, MigrationError, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default identity authority. Overridable for sovereign clouds and tests.
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Overall ceiling on device-code polling.
const DEVICE_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Minutes of expiry skew below which a token is considered stale.
const EXPIRY_SKEW_MINUTES: i64 = 5;

/// Anything that can produce a bearer token for source requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_access_token(&self) -> Result<String>;
}

/// A fixed token, for tests and pre-authenticated embeddings.
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default)]
    interval: Option<u64>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Manages bearer tokens for the source REST surface.
pub struct AuthManager {
    http: reqwest::Client,
    tenant_id: String,
    client_id: String,
    /// Scheme+host of the configured source URL; scopes are rooted here.
    resource_root: String,
    authority: String,
    poll_timeout: Duration,
    cache: TokenCache,
    display: Arc<dyn DeviceCodeDisplay>,
    current: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("resource_root", &self.resource_root)
            .field("authority", &self.authority)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        source_url: &str,
        cache: TokenCache,
        display: Arc<dyn DeviceCodeDisplay>,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();
        if tenant_id.trim().is_empty() {
            return Err(MigrationError::config("TENANT_ID is not set"));
        }
        if client_id.trim().is_empty() {
            return Err(MigrationError::config("CLIENT_ID is not set"));
        }
        let url = reqwest::Url::parse(source_url).map_err(|e| {
            MigrationError::config(format!("PROJECT_ONLINE_URL is not a valid URL: {e}"))
        })?;
        let host = url.host_str().ok_or_else(|| {
            MigrationError::config("PROJECT_ONLINE_URL has no host component")
        })?;
        let resource_root = format!("{}://{}", url.scheme(), host);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Ok(Self {
            http,
            tenant_id,
            client_id,
            resource_root,
            authority: DEFAULT_AUTHORITY.to_string(),
            poll_timeout: DEVICE_POLL_TIMEOUT,
            cache,
            display,
            current: Mutex::new(None),
        })
    }

    /// Point at a different identity authority (sovereign clouds, tests).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    /// Shrink the device-code poll ceiling (tests).
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    fn scopes(&self) -> String {
        format!(
            "{root}/AllSites.Read {root}/AllSites.Write offline_access",
            root = self.resource_root
        )
    }

    fn device_code_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/devicecode", self.authority, self.tenant_id)
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    /// Returns a valid bearer token, walking the attempt ladder.
    pub async fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if token.is_valid(EXPIRY_SKEW_MINUTES) {
                return Ok(token.access_token.clone());
            }
        }

        let disk = self.cache.load(&self.tenant_id, &self.client_id).await;
        if let Some(token) = disk.as_ref() {
            if token.is_valid(EXPIRY_SKEW_MINUTES) {
                *current = Some(token.clone());
                return Ok(token.access_token.clone());
            }
        }

        // Stale everywhere; prefer a refresh token from either copy.
        let refresh_token = current
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .or_else(|| disk.as_ref().and_then(|t| t.refresh_token.clone()));

        if let Some(rt) = refresh_token {
            self.display.show_token_refresh();
            match self.refresh(&rt).await {
                Ok(token) => {
                    self.cache
                        .store(&self.tenant_id, &self.client_id, &token)
                        .await?;
                    let access = token.access_token.clone();
                    *current = Some(token);
                    return Ok(access);
                }
                Err(err) => {
                    tracing::warn!(%err, "token refresh failed; falling back to device code");
                    self.cache.clear(&self.tenant_id, &self.client_id).await;
                    *current = None;
                }
            }
        }

        let token = self.device_code_flow().await?;
        self.cache
            .store(&self.tenant_id, &self.client_id, &token)
            .await?;
        let access = token.access_token.clone();
        *current = Some(token);
        Ok(access)
    }

    /// Run the whole attempt ladder and report whether it produced a token.
    pub async fn test_authentication(&self) -> bool {
        self.access_token().await.is_ok()
    }

    /// Drop the persisted entry for this identity.
    pub async fn clear_cache(&self) {
        self.cache.clear(&self.tenant_id, &self.client_id).await;
        *self.current.lock().await = None;
    }

    /// Drop every persisted entry.
    pub async fn clear_all_caches(&self) {
        self.cache.clear_all().await;
        *self.current.lock().await = None;
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedToken> {
        let scope = self.scopes();
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        let resp = self
            .http
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(MigrationError::from_transport)?;

        if resp.status().is_success() {
            let token: TokenResponse = resp.json().await.map_err(MigrationError::from_transport)?;
            Ok(Self::to_cached(token))
        } else {
            let body: TokenErrorResponse = resp.json().await.unwrap_or(TokenErrorResponse {
                error: "unknown".into(),
                error_description: None,
            });
            Err(MigrationError::auth(
                AuthErrorKind::Refresh,
                body.error_description.unwrap_or(body.error),
            ))
        }
    }

    async fn device_code_flow(&self) -> Result<CachedToken> {
        let scope = self.scopes();
        let params = [
            ("client_id", self.client_id.as_str()),
            ("scope", scope.as_str()),
        ];
        let resp = self
            .http
            .post(self.device_code_url())
            .form(&params)
            .send()
            .await
            .map_err(MigrationError::from_transport)?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(MigrationError::auth(
                AuthErrorKind::InvalidCode,
                format!("device code request failed with HTTP {status}"),
            ));
        }
        let dc: DeviceCodeResponse = resp.json().await.map_err(MigrationError::from_transport)?;

        self.display.display(&dc.user_code, &dc.verification_uri);

        let mut interval = Duration::from_secs(dc.interval.unwrap_or(5).max(1));
        let deadline = tokio::time::Instant::now()
            + self.poll_timeout.min(Duration::from_secs(dc.expires_in));

        loop {
            if tokio::time::Instant::now() >= deadline {
                self.display.show_error("authorization_pending", None);
                return Err(MigrationError::auth(
                    AuthErrorKind::PendingTimeout,
                    "device-code sign-in was not completed in time",
                ));
            }
            tokio::time::sleep(interval).await;

            let params = [
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("client_id", self.client_id.as_str()),
                ("device_code", dc.device_code.as_str()),
            ];
            let resp = self
                .http
                .post(self.token_url())
                .form(&params)
                .send()
                .await
                .map_err(MigrationError::from_transport)?;

            if resp.status().is_success() {
                let token: TokenResponse =
                    resp.json().await.map_err(MigrationError::from_transport)?;
                self.display.show_success();
                return Ok(Self::to_cached(token));
            }

            let body: TokenErrorResponse = resp.json().await.unwrap_or(TokenErrorResponse {
                error: "unknown".into(),
                error_description: None,
            });
            match body.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => {
                    interval += Duration::from_secs(5);
                }
                "authorization_declined" => {
                    self.display
                        .show_error(&body.error, body.error_description.as_deref());
                    return Err(MigrationError::auth(
                        AuthErrorKind::Declined,
                        "the user declined the sign-in request",
                    ));
                }
                "expired_token" => {
                    self.display
                        .show_error(&body.error, body.error_description.as_deref());
                    return Err(MigrationError::auth(
                        AuthErrorKind::Expired,
                        "the device code expired before sign-in completed",
                    ));
                }
                other => {
                    self.display
                        .show_error(other, body.error_description.as_deref());
                    return Err(MigrationError::auth(
                        AuthErrorKind::InvalidCode,
                        body.error_description.unwrap_or_else(|| other.to_string()),
                    ));
                }
            }
        }
    }

    fn to_cached(token: TokenResponse) -> CachedToken {
        CachedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_on: Utc::now() + ChronoDuration::seconds(token.expires_in.max(0)),
            scopes: token
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl TokenProvider for AuthManager {
    async fn get_access_token(&self) -> Result<String> {
        self.access_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::display::TracingDisplay;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> AuthManager {
        AuthManager::new(
            "tenant-1",
            "client-1",
            "https://contoso.sharepoint.com/sites/pwa",
            TokenCache::new(dir.path()),
            Arc::new(TracingDisplay),
        )
        .unwrap()
    }

    #[test]
    fn test_scopes_rooted_at_tenant_host() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let scopes = mgr.scopes();
        assert!(scopes.contains("https://contoso.sharepoint.com/AllSites.Read"));
        assert!(scopes.contains("https://contoso.sharepoint.com/AllSites.Write"));
        assert!(scopes.contains("offline_access"));
    }

    #[test]
    fn test_missing_tenant_rejected() {
        let dir = TempDir::new().unwrap();
        let err = AuthManager::new(
            "",
            "client",
            "https://contoso.sharepoint.com/sites/pwa",
            TokenCache::new(dir.path()),
            Arc::new(TracingDisplay),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::Configuration { .. }));
        assert!(err.to_string().contains("TENANT_ID"));
    }

    #[test]
    fn test_malformed_url_rejected() {
        let dir = TempDir::new().unwrap();
        let err = AuthManager::new(
            "t",
            "c",
            "not a url",
            TokenCache::new(dir.path()),
            Arc::new(TracingDisplay),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_valid_cached_token_short_circuits() {
        let dir = TempDir::new().unwrap();
        let cache = TokenCache::new(dir.path());
        cache
            .store(
                "tenant-1",
                "client-1",
                &CachedToken {
                    access_token: "cached-token".into(),
                    refresh_token: None,
                    expires_on: Utc::now() + ChronoDuration::hours(1),
                    scopes: vec![],
                },
            )
            .await
            .unwrap();
        let mgr = manager(&dir);
        // No HTTP endpoint is reachable in tests; success proves the cache hit.
        assert_eq!(mgr.access_token().await.unwrap(), "cached-token");
    }
}
