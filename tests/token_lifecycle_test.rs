//! Access-token lifecycle against a mocked accounts host: exchange,
//! caching, expiry skew, single-flight refresh, and session teardown.

use httpmock::prelude::*;
use serde_json::json;

use zoho_mail_bridge::auth::{AuthSession, Region, TokenManager, EXPIRY_SKEW_MS};
use zoho_mail_bridge::store::LocalStore;
use zoho_mail_bridge::utils::AppError;

async fn seeded_store() -> LocalStore {
    let store = LocalStore::in_memory();
    store
        .update_local(|s| {
            s.zoho_client_id = Some("client-id".into());
            s.zoho_client_secret = Some("client-secret".into());
            s.zoho_refresh_token = Some("refresh-token".into());
        })
        .await
        .unwrap();
    store
}

fn manager_for(store: &LocalStore, server: &MockServer) -> TokenManager {
    let session = AuthSession::new(store.clone());
    TokenManager::new(session).with_accounts_base(server.base_url())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[tokio::test]
async fn test_login_exchanges_refresh_token_and_stores_session() {
    let server = MockServer::start_async().await;
    let exchange = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/oauth/v2/token")
                .body_contains("grant_type=refresh_token")
                .body_contains("refresh_token=refresh-token")
                .body_contains("client_id=client-id")
                .body_contains("client_secret=client-secret");
            then.status(200)
                .json_body(json!({ "access_token": "abc", "expires_in": 3600 }));
        })
        .await;

    let store = seeded_store().await;
    let tokens = manager_for(&store, &server);

    tokens.login(Region::Com).await.unwrap();

    exchange.assert_async().await;
    let state = store.local().await;
    assert_eq!(state.access_token.as_deref(), Some("abc"));
    assert!(state.is_logged_in);
    let expiry = state.token_expiry.unwrap();
    // Roughly one hour from now.
    assert!(expiry > now_ms() + 3_500_000 && expiry < now_ms() + 3_700_000);
}

#[tokio::test]
async fn test_stored_region_wins_over_login_argument() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200)
                .json_body(json!({ "access_token": "abc", "expires_in": 3600 }));
        })
        .await;

    let store = seeded_store().await;
    store
        .update_local(|s| s.region = Some("eu".into()))
        .await
        .unwrap();
    let tokens = manager_for(&store, &server);

    tokens.login(Region::Com).await.unwrap();

    assert_eq!(store.local().await.region.as_deref(), Some("eu"));
}

#[tokio::test]
async fn test_cached_token_is_reused_without_network() {
    let server = MockServer::start_async().await;
    let exchange = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200)
                .json_body(json!({ "access_token": "new", "expires_in": 3600 }));
        })
        .await;

    let store = seeded_store().await;
    store
        .update_local(|s| {
            s.access_token = Some("cached".into());
            s.token_expiry = Some(now_ms() + 3_600_000);
            s.is_logged_in = true;
        })
        .await
        .unwrap();
    let tokens = manager_for(&store, &server);

    let token = tokens.get_valid_access_token().await.unwrap();

    assert_eq!(token, "cached");
    assert_eq!(exchange.hits_async().await, 0);
}

#[tokio::test]
async fn test_token_inside_skew_window_is_refreshed() {
    let server = MockServer::start_async().await;
    let exchange = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200)
                .json_body(json!({ "access_token": "new", "expires_in": 3600 }));
        })
        .await;

    let store = seeded_store().await;
    store
        .update_local(|s| {
            s.access_token = Some("stale".into());
            // Expires in one minute, well inside the five-minute skew.
            s.token_expiry = Some(now_ms() + EXPIRY_SKEW_MS / 5);
            s.is_logged_in = true;
        })
        .await
        .unwrap();
    let tokens = manager_for(&store, &server);

    let token = tokens.get_valid_access_token().await.unwrap();

    assert_eq!(token, "new");
    assert_eq!(exchange.hits_async().await, 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_exchange() {
    let server = MockServer::start_async().await;
    let exchange = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200)
                .json_body(json!({ "access_token": "shared", "expires_in": 3600 }));
        })
        .await;

    let store = seeded_store().await;
    let tokens = manager_for(&store, &server);

    let (a, b) = tokio::join!(
        tokens.get_valid_access_token(),
        tokens.get_valid_access_token()
    );

    assert_eq!(a.unwrap(), "shared");
    assert_eq!(b.unwrap(), "shared");
    assert_eq!(exchange.hits_async().await, 1);
}

#[tokio::test]
async fn test_rejected_refresh_clears_session() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(400).json_body(json!({ "error": "invalid_code" }));
        })
        .await;

    let store = seeded_store().await;
    store
        .update_local(|s| {
            s.access_token = Some("old".into());
            s.token_expiry = Some(now_ms() - 1000);
            s.is_logged_in = true;
            s.account_id = Some("acc".into());
        })
        .await
        .unwrap();
    let tokens = manager_for(&store, &server);

    let result = tokens.get_valid_access_token().await;

    assert!(matches!(result, Err(AppError::SessionExpired)));
    let state = store.local().await;
    assert!(state.access_token.is_none());
    assert!(!state.is_logged_in);
    assert!(state.account_id.is_none());
    // Credentials survive so the user can log in again.
    assert_eq!(state.zoho_refresh_token.as_deref(), Some("refresh-token"));
}

#[tokio::test]
async fn test_error_field_in_ok_body_counts_as_rejection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200).json_body(json!({ "error": "invalid_client" }));
        })
        .await;

    let store = seeded_store().await;
    let tokens = manager_for(&store, &server);

    assert!(matches!(
        tokens.refresh().await,
        Err(AppError::SessionExpired)
    ));
}

#[tokio::test]
async fn test_login_without_credentials_fails_before_network() {
    let server = MockServer::start_async().await;
    let exchange = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/v2/token");
            then.status(200)
                .json_body(json!({ "access_token": "abc", "expires_in": 3600 }));
        })
        .await;

    let store = LocalStore::in_memory();
    let tokens = manager_for(&store, &server);

    let result = tokens.login(Region::Com).await;

    assert!(matches!(result, Err(AppError::CredentialsMissing)));
    assert_eq!(exchange.hits_async().await, 0);
}

#[tokio::test]
async fn test_logout_clears_session_even_when_revocation_fails() {
    // No revoke mock registered: the spawned revocation draws a 404 and
    // is ignored.
    let server = MockServer::start_async().await;

    let store = seeded_store().await;
    store
        .update_local(|s| {
            s.access_token = Some("abc".into());
            s.token_expiry = Some(now_ms() + 3_600_000);
            s.is_logged_in = true;
        })
        .await
        .unwrap();
    let tokens = manager_for(&store, &server);

    tokens.logout().await;

    let state = store.local().await;
    assert!(state.access_token.is_none());
    assert!(state.token_expiry.is_none());
    assert!(!state.is_logged_in);
    assert_eq!(state.zoho_client_id.as_deref(), Some("client-id"));
}
