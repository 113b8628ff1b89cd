//! Generic mail-API forwarding.
//!
//! Accepts any method under `/api/`, resolves the regional mail host
//! from the `X-Zoho-Region` header, and reissues the identical method,
//! path (including the `/api` prefix — the Zoho Mail API lives under
//! it), query string and body with JSON content negotiation headers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use super::{passthrough_response, upstream_error, RelayState};
use crate::auth::endpoints::Region;
use crate::utils::logging::*;

pub async fn handle_api_forward(
    State(state): State<Arc<RelayState>>,
    request: Request,
) -> Response {
    let Some(auth_header) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "No authorization header" })),
        )
            .into_response();
    };

    let region = Region::parse(
        request
            .headers()
            .get("x-zoho-region")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default(),
    );

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let mail_base = state.mail_base(region);
    let upstream_url = format!("{}{}", mail_base, path_and_query);

    let method = request.method().as_str().to_string();
    log_relay_forward(&method, &path_and_query, &mail_base);

    let body = match axum::body::to_bytes(request.into_body(), usize::MAX).await {
        Ok(body) => body,
        Err(e) => return upstream_error(e),
    };

    // axum and reqwest pin different `http` major versions, so the
    // method crosses the boundary by name.
    let upstream_method = reqwest::Method::from_bytes(method.as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let mut upstream_request = state
        .http
        .request(upstream_method, &upstream_url)
        .header("Authorization", auth_header)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json");

    if !body.is_empty() {
        upstream_request = upstream_request.body(body.to_vec());
    }

    let upstream = match upstream_request.send().await {
        Ok(response) => response,
        Err(e) => return upstream_error(e),
    };

    let status = upstream.status().as_u16();
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => return upstream_error(e),
    };

    log_relay_response(&path_and_query, status);
    passthrough_response(status, body)
}
