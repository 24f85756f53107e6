//! Integration tests for the OAuth flows against a local mock identity
//! endpoint: device-code happy path, declined sign-in, refresh, and
//! refresh-failure fallback.

use pmo_migrator::auth::{AuthManager, CachedToken, DeviceCodeDisplay, TokenCache};
use pmo_migrator::error::{AuthErrorKind, MigrationError};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingDisplay {
    displays: AtomicU32,
    successes: AtomicU32,
    errors: AtomicU32,
    refreshes: AtomicU32,
}

impl DeviceCodeDisplay for RecordingDisplay {
    fn display(&self, user_code: &str, verification_url: &str) {
        assert!(!user_code.is_empty());
        assert!(!verification_url.is_empty());
        self.displays.fetch_add(1, Ordering::SeqCst);
    }
    fn show_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }
    fn show_error(&self, _code: &str, _message: Option<&str>) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn show_token_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

fn manager(
    server: &MockServer,
    dir: &TempDir,
    display: Arc<RecordingDisplay>,
) -> AuthManager {
    AuthManager::new(
        "tenant-1",
        "client-1",
        "https://contoso.sharepoint.com/sites/pwa",
        TokenCache::new(dir.path()),
        display,
    )
    .unwrap()
    .with_authority(server.uri())
    .with_poll_timeout(Duration::from_secs(30))
}

async fn mount_device_code(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/devicecode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 1
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_device_code_flow_polls_until_success() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let display = Arc::new(RecordingDisplay::default());

    mount_device_code(&server).await;
    // First poll: pending. Second poll: tokens.
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "authorization_pending"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "refresh_token": "refresh-1",
            "expires_in": 3600,
            "scope": "https://contoso.sharepoint.com/AllSites.Read"
        })))
        .mount(&server)
        .await;

    let mgr = manager(&server, &dir, display.clone());
    let token = mgr.access_token().await.unwrap();
    assert_eq!(token, "fresh-token");
    assert_eq!(display.displays.load(Ordering::SeqCst), 1);
    assert_eq!(display.successes.load(Ordering::SeqCst), 1);

    // The token landed in the persisted cache with its refresh token.
    let cached = TokenCache::new(dir.path())
        .load("tenant-1", "client-1")
        .await
        .unwrap();
    assert_eq!(cached.access_token, "fresh-token");
    assert_eq!(cached.refresh_token.as_deref(), Some("refresh-1"));

    // A second acquisition is served from memory, no further HTTP.
    let before = server.received_requests().await.unwrap().len();
    assert_eq!(mgr.access_token().await.unwrap(), "fresh-token");
    assert_eq!(server.received_requests().await.unwrap().len(), before);
}

#[tokio::test]
async fn test_declined_sign_in_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let display = Arc::new(RecordingDisplay::default());

    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "authorization_declined"})),
        )
        .mount(&server)
        .await;

    let mgr = manager(&server, &dir, display.clone());
    let err = mgr.access_token().await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Auth {
            kind: AuthErrorKind::Declined,
            ..
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(display.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_device_code() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let display = Arc::new(RecordingDisplay::default());

    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "expired_token"})))
        .mount(&server)
        .await;

    let err = manager(&server, &dir, display)
        .access_token()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Auth {
            kind: AuthErrorKind::Expired,
            ..
        }
    ));
}

#[tokio::test]
async fn test_refresh_token_used_before_device_code() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let display = Arc::new(RecordingDisplay::default());

    // Seed an expired token with a refresh token.
    TokenCache::new(dir.path())
        .store(
            "tenant-1",
            "client-1",
            &CachedToken {
                access_token: "stale".into(),
                refresh_token: Some("refresh-1".into()),
                expires_on: chrono::Utc::now() - chrono::Duration::hours(1),
                scopes: vec![],
            },
        )
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "refreshed-token",
            "refresh_token": "refresh-2",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let mgr = manager(&server, &dir, display.clone());
    assert_eq!(mgr.access_token().await.unwrap(), "refreshed-token");
    assert_eq!(display.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(
        display.displays.load(Ordering::SeqCst),
        0,
        "no device-code prompt when refresh succeeds"
    );

    // The rotated refresh token was persisted.
    let cached = TokenCache::new(dir.path())
        .load("tenant-1", "client-1")
        .await
        .unwrap();
    assert_eq!(cached.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn test_refresh_failure_purges_cache_and_falls_back() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let display = Arc::new(RecordingDisplay::default());

    TokenCache::new(dir.path())
        .store(
            "tenant-1",
            "client-1",
            &CachedToken {
                access_token: "stale".into(),
                refresh_token: Some("revoked".into()),
                expires_on: chrono::Utc::now() - chrono::Duration::hours(1),
                scopes: vec![],
            },
        )
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked"
        })))
        .mount(&server)
        .await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("device_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-after-fallback",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let mgr = manager(&server, &dir, display.clone());
    assert_eq!(mgr.access_token().await.unwrap(), "fresh-after-fallback");
    assert_eq!(
        display.displays.load(Ordering::SeqCst),
        1,
        "fallback must prompt the user"
    );
}

#[tokio::test]
async fn test_clear_cache_forces_reauth() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let display = Arc::new(RecordingDisplay::default());

    let cache = TokenCache::new(dir.path());
    cache
        .store(
            "tenant-1",
            "client-1",
            &CachedToken {
                access_token: "valid".into(),
                refresh_token: None,
                expires_on: chrono::Utc::now() + chrono::Duration::hours(1),
                scopes: vec![],
            },
        )
        .await
        .unwrap();

    let mgr = manager(&server, &dir, display);
    assert_eq!(mgr.access_token().await.unwrap(), "valid");

    mgr.clear_cache().await;
    assert!(
        TokenCache::new(dir.path())
            .load("tenant-1", "client-1")
            .await
            .is_none(),
        "clear_cache must remove the persisted entry"
    );
}
