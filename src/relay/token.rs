//! Token-exchange forwarding.
//!
//! The extension cannot POST to `accounts.zoho.*` from a browser
//! context, so it sends its refresh-token exchange here as JSON and the
//! relay reissues it form-encoded with `grant_type=refresh_token`
//! injected. The upstream status and body come back verbatim so the
//! caller sees Zoho's original error payload.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::{passthrough_response, upstream_error, RelayState};
use crate::auth::endpoints::Region;
use crate::utils::logging::*;

#[derive(Debug, Deserialize)]
pub struct TokenExchangeRequest {
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub region: Option<String>,
}

pub async fn handle_token_exchange(
    State(state): State<Arc<RelayState>>,
    Json(request): Json<TokenExchangeRequest>,
) -> Response {
    let region = Region::parse(request.region.as_deref().unwrap_or_default());
    let token_url = state.token_url(region);
    log_token_exchange(&token_url);

    let params = [
        ("refresh_token", request.refresh_token.as_str()),
        ("client_id", request.client_id.as_str()),
        ("client_secret", request.client_secret.as_str()),
        ("grant_type", "refresh_token"),
    ];

    let upstream = match state.http.post(&token_url).form(&params).send().await {
        Ok(response) => response,
        Err(e) => return upstream_error(e),
    };

    let status = upstream.status().as_u16();
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => return upstream_error(e),
    };

    log_relay_response("/token", status);
    passthrough_response(status, body)
}
