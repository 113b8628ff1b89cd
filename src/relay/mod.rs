//! Local relay server.
//!
//! Zoho rejects browser-originated API requests, so the extension talks
//! to this process on a fixed local port and the relay reissues the
//! calls against the regional Zoho hosts. The relay adds permissive
//! CORS headers to every response and answers preflights itself; it
//! performs no retries and no authentication of its own (any local
//! process may call it — known limitation).

pub mod api;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get, post};
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::auth::endpoints::Region;
use crate::config::Settings;
use crate::utils::logging::*;

pub struct RelayState {
    pub http: reqwest::Client,
    accounts_base_override: Option<String>,
    mail_base_override: Option<String>,
}

impl RelayState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            accounts_base_override: settings.relay.accounts_base_url.clone(),
            mail_base_override: settings.relay.mail_base_url.clone(),
        }
    }

    pub fn token_url(&self, region: Region) -> String {
        match &self.accounts_base_override {
            Some(base) => format!("{}/oauth/v2/token", base.trim_end_matches('/')),
            None => format!("https://{}/oauth/v2/token", region.accounts_host()),
        }
    }

    pub fn mail_base(&self, region: Region) -> String {
        match &self.mail_base_override {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}", region.mail_host()),
        }
    }
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/token", post(token::handle_token_exchange))
        .route("/api/*rest", any(api::handle_api_forward))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the sandboxed extension caller: preflights are answered
/// locally with 204, and every other response carries the permissive
/// headers. This is the entire reason the relay exists.
async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut response);
        return response;
    }

    let mut response = next.run(req).await;
    apply_cors_headers(&mut response);
    response
}

fn apply_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Zoho-Region"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
}

async fn health_check() -> Json<serde_json::Value> {
    log_health_check();

    Json(json!({
        "status": "healthy",
        "service": "zoho-mail-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

/// Upstream status and body are passed through byte-for-byte so the
/// caller can parse Zoho's original error payloads.
pub(crate) fn passthrough_response(status: u16, body: axum::body::Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Any failure while contacting upstream yields a 500 with the failure
/// message; the relay never retries.
pub(crate) fn upstream_error(error: impl std::fmt::Display) -> Response {
    log_error(&format!("Upstream request failed: {}", error));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": error.to_string() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_hosts_used_without_overrides() {
        let settings = test_settings(None, None);
        let state = RelayState::new(&settings);
        assert_eq!(
            state.token_url(Region::In),
            "https://accounts.zoho.in/oauth/v2/token"
        );
        assert_eq!(state.mail_base(Region::Au), "https://mail.zoho.com.au");
    }

    #[test]
    fn test_overrides_replace_hosts() {
        let settings = test_settings(
            Some("http://127.0.0.1:9000/".into()),
            Some("http://127.0.0.1:9001".into()),
        );
        let state = RelayState::new(&settings);
        assert_eq!(
            state.token_url(Region::Com),
            "http://127.0.0.1:9000/oauth/v2/token"
        );
        assert_eq!(state.mail_base(Region::Eu), "http://127.0.0.1:9001");
    }

    fn test_settings(accounts: Option<String>, mail: Option<String>) -> Settings {
        Settings {
            server: crate::config::settings::ServerSettings {
                host: "127.0.0.1".into(),
                port: 0,
            },
            relay: crate::config::settings::RelaySettings {
                base_url: "http://127.0.0.1:0".into(),
                accounts_base_url: accounts,
                mail_base_url: mail,
            },
            storage: crate::config::settings::StorageSettings { dir: ".".into() },
        }
    }
}
