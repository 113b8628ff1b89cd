//! Token Manager
//!
//! Owns the access-token lifecycle: refresh-token exchange, expiry
//! tracking, and sign-out revocation. Login and refresh share a single
//! exchange path; the only difference is that login seeds the region
//! before the first exchange.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::auth::endpoints::{resolve, Region};
use crate::auth::session::AuthSession;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};

/// Refresh this long before the provider-reported expiry.
pub const EXPIRY_SKEW_MS: i64 = 5 * 60 * 1000;

/// Assumed lifetime when the provider omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Token endpoint response. Zoho reports failures either through a
/// non-2xx status or an `error` field in an otherwise-200 body, so both
/// are checked.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct TokenManager {
    session: Arc<AuthSession>,
    http: Client,
    /// Replaces the per-region accounts host when set. Test seam.
    accounts_base_override: Option<String>,
}

impl TokenManager {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            session,
            http: Client::new(),
            accounts_base_override: None,
        }
    }

    pub fn with_accounts_base(mut self, base_url: impl Into<String>) -> Self {
        self.accounts_base_override = Some(base_url.into());
        self
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    fn token_url(&self, region: Region) -> String {
        match &self.accounts_base_override {
            Some(base) => format!("{}/oauth/v2/token", base.trim_end_matches('/')),
            None => resolve(region).token,
        }
    }

    fn revoke_url(&self, region: Region) -> String {
        match &self.accounts_base_override {
            Some(base) => format!("{}/oauth/v2/token/revoke", base.trim_end_matches('/')),
            None => resolve(region).revoke,
        }
    }

    /// Returns the cached access token while it is more than five
    /// minutes from expiry, refreshing otherwise.
    pub async fn get_valid_access_token(&self) -> AppResult<String> {
        let state = self.session.token_state().await;
        let now_ms = Utc::now().timestamp_millis();
        if let Some(token) = state.fresh(now_ms, EXPIRY_SKEW_MS) {
            return Ok(token.to_string());
        }
        self.refresh().await
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// Concurrent callers converge on one upstream exchange: the
    /// session's refresh guard serializes them, and freshness is
    /// re-checked after the guard is acquired so late arrivals reuse
    /// the token the winning refresh stored.
    pub async fn refresh(&self) -> AppResult<String> {
        self.refresh_inner(None).await
    }

    /// Forces a new exchange after `rejected` was refused upstream. A
    /// token that looks fresh locally but drew a 401 must not be
    /// returned again; a different fresh token (stored by a competing
    /// refresh while waiting for the guard) is reused as usual.
    pub async fn refresh_after_rejection(&self, rejected: &str) -> AppResult<String> {
        self.refresh_inner(Some(rejected)).await
    }

    async fn refresh_inner(&self, rejected: Option<&str>) -> AppResult<String> {
        let _guard = self.session.lock_refresh().await;

        let state = self.session.token_state().await;
        let now_ms = Utc::now().timestamp_millis();
        if let Some(token) = state.fresh(now_ms, EXPIRY_SKEW_MS) {
            if rejected != Some(token) {
                return Ok(token.to_string());
            }
        }

        let credentials = self.session.credentials().await?;
        let token_url = self.token_url(credentials.region);
        log_token_exchange(&token_url);

        let params = [
            ("refresh_token", credentials.refresh_token.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.http.post(&token_url).form(&params).send().await?;
        let status = response.status();
        let body: TokenResponse = response.json().await?;

        let access_token = match (status.is_success(), body.error, body.access_token) {
            (true, None, Some(token)) => token,
            (_, error, _) => {
                log_warning(&format!(
                    "Token exchange rejected (status {}, error {:?}); clearing session",
                    status,
                    error.as_deref().unwrap_or("none")
                ));
                // The refresh token itself is no longer usable.
                self.session.clear().await?;
                return Err(AppError::SessionExpired);
            }
        };

        let lifetime_secs = body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expires_at_ms = Utc::now().timestamp_millis() + lifetime_secs * 1000;
        self.session.set_token(&access_token, expires_at_ms).await?;

        Ok(access_token)
    }

    /// Initial token acquisition. Verifies the credential set is
    /// complete before any network call, persists the region, then runs
    /// the shared exchange path.
    pub async fn login(&self, region: Region) -> AppResult<()> {
        let state = self.session.local_state().await;
        crate::auth::session::Credentials::from_state(&state)?;

        // A previously stored region wins over the caller's argument.
        let actual_region = match state.region.as_deref() {
            Some(code) if !code.is_empty() => Region::parse(code),
            _ => region,
        };
        self.session.set_region(actual_region).await?;

        self.refresh().await?;
        log_info("Login successful");
        Ok(())
    }

    /// Clears the session. Revocation is advisory cleanup: it is fired
    /// without awaiting the result and any failure is ignored.
    pub async fn logout(&self) {
        let state = self.session.local_state().await;

        if let Some(access_token) = state.access_token {
            let region = Region::parse(state.region.as_deref().unwrap_or_default());
            let url = format!(
                "{}?token={}",
                self.revoke_url(region),
                urlencoding::encode(&access_token)
            );
            let http = self.http.clone();
            tokio::spawn(async move {
                if let Err(e) = http.post(&url).send().await {
                    log_warning(&format!("Token revocation failed (ignored): {}", e));
                }
            });
        }

        if let Err(e) = self.session.clear().await {
            log_warning(&format!("Failed to flush cleared session (ignored): {}", e));
        }
    }
}
