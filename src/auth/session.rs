//! Auth session: explicit owner of credentials and token state.
//!
//! All credential and token reads/writes go through this object instead
//! of ambient storage, which makes the concurrent-refresh hazard
//! visible: the single in-flight-refresh guard lives here, keyed to the
//! credential set this session wraps.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::auth::endpoints::Region;
use crate::store::{LocalState, LocalStore};
use crate::utils::{AppError, AppResult};

/// Immutable credential snapshot, complete by construction.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub region: Region,
}

impl Credentials {
    /// Builds credentials from stored state, failing with
    /// `CredentialsMissing` when any field is absent or empty. Callers
    /// rely on this check happening before any network call.
    pub fn from_state(state: &LocalState) -> AppResult<Self> {
        let client_id = required(&state.zoho_client_id)?;
        let client_secret = required(&state.zoho_client_secret)?;
        let refresh_token = required(&state.zoho_refresh_token)?;
        let region = Region::parse(state.region.as_deref().unwrap_or_default());

        Ok(Self {
            client_id,
            client_secret,
            refresh_token,
            region,
        })
    }
}

fn required(field: &Option<String>) -> AppResult<String> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(AppError::CredentialsMissing),
    }
}

/// Cached access-token state. At most one access token is cached per
/// session; a present token always carries its expiry.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    pub access_token: Option<String>,
    pub expires_at_ms: Option<i64>,
    pub logged_in: bool,
}

impl TokenState {
    /// Returns the token if it is still fresh at `now_ms` given the
    /// expiry skew. A token with no recorded expiry is never fresh.
    pub fn fresh(&self, now_ms: i64, skew_ms: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at_ms) {
            (Some(token), Some(expires_at)) if now_ms < expires_at - skew_ms => Some(token),
            _ => None,
        }
    }
}

pub struct AuthSession {
    store: LocalStore,
    refresh_guard: Mutex<()>,
}

impl AuthSession {
    pub fn new(store: LocalStore) -> Arc<Self> {
        Arc::new(Self {
            store,
            refresh_guard: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub async fn local_state(&self) -> LocalState {
        self.store.local().await
    }

    pub async fn token_state(&self) -> TokenState {
        let state = self.store.local().await;
        TokenState {
            access_token: state.access_token,
            expires_at_ms: state.token_expiry,
            logged_in: state.is_logged_in,
        }
    }

    pub async fn credentials(&self) -> AppResult<Credentials> {
        Credentials::from_state(&self.store.local().await)
    }

    pub async fn region(&self) -> Region {
        Region::parse(self.store.local().await.region.as_deref().unwrap_or_default())
    }

    pub async fn set_region(&self, region: Region) -> AppResult<()> {
        self.store
            .update_local(|state| state.region = Some(region.as_str().to_string()))
            .await
    }

    pub async fn set_token(&self, access_token: &str, expires_at_ms: i64) -> AppResult<()> {
        let token = access_token.to_string();
        self.store
            .update_local(move |state| {
                state.access_token = Some(token);
                state.token_expiry = Some(expires_at_ms);
                state.is_logged_in = true;
            })
            .await
    }

    pub async fn is_logged_in(&self) -> bool {
        let state = self.store.local().await;
        state.is_logged_in && state.access_token.is_some()
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.store.clear_session().await
    }

    /// Serializes refreshes for this credential set. Callers must
    /// re-check token freshness after acquiring the guard: a competing
    /// refresh may have completed while they waited.
    pub async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_guard.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness_respects_skew() {
        let state = TokenState {
            access_token: Some("abc".into()),
            expires_at_ms: Some(1_000_000),
            logged_in: true,
        };
        let skew = 300_000;
        assert_eq!(state.fresh(600_000, skew), Some("abc"));
        // Inside the skew window counts as expiring.
        assert_eq!(state.fresh(700_001, skew), None);
        assert_eq!(state.fresh(999_999, skew), None);
    }

    #[test]
    fn test_absent_expiry_is_never_fresh() {
        let state = TokenState {
            access_token: Some("abc".into()),
            expires_at_ms: None,
            logged_in: true,
        };
        assert_eq!(state.fresh(0, 0), None);
    }

    #[test]
    fn test_credentials_require_all_fields() {
        let mut state = LocalState::default();
        state.zoho_client_id = Some("id".into());
        state.zoho_client_secret = Some("secret".into());
        assert!(matches!(
            Credentials::from_state(&state),
            Err(AppError::CredentialsMissing)
        ));

        state.zoho_refresh_token = Some("refresh".into());
        state.region = Some("eu".into());
        let creds = Credentials::from_state(&state).unwrap();
        assert_eq!(creds.region, Region::Eu);
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let mut state = LocalState::default();
        state.zoho_client_id = Some("  ".into());
        state.zoho_client_secret = Some("secret".into());
        state.zoho_refresh_token = Some("refresh".into());
        assert!(matches!(
            Credentials::from_state(&state),
            Err(AppError::CredentialsMissing)
        ));
    }
}
