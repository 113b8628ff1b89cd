//! Persisted key/value state in two scopes: device-local session state
//! and synced user preferences. Each scope is a JSON file loaded once at
//! startup and flushed on every mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::utils::{AppError, AppResult};

const LOCAL_FILE: &str = "local.json";
const SYNC_FILE: &str = "sync.json";

/// Device-local state. Field names serialize to the extension's storage
/// keys (`zohoClientId`, `tokenExpiry`, ...), so an existing store file
/// is readable as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalState {
    pub zoho_client_id: Option<String>,
    pub zoho_client_secret: Option<String>,
    pub zoho_refresh_token: Option<String>,
    pub region: Option<String>,
    pub access_token: Option<String>,
    /// Epoch milliseconds.
    pub token_expiry: Option<i64>,
    pub is_logged_in: bool,
    pub account_id: Option<String>,
    pub inbox_folder_id: Option<String>,
    pub user_email: Option<String>,
    pub last_email_ids: Vec<String>,
}

/// Preferences synced across the user's devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncedPrefs {
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
    /// Poll interval in minutes.
    pub check_interval: u64,
    pub max_emails: usize,
}

impl Default for SyncedPrefs {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            sound_enabled: true,
            check_interval: 5,
            max_emails: 20,
        }
    }
}

#[derive(Clone)]
pub struct LocalStore {
    local_path: Option<PathBuf>,
    sync_path: Option<PathBuf>,
    local: Arc<RwLock<LocalState>>,
    synced: Arc<RwLock<SyncedPrefs>>,
}

impl LocalStore {
    /// Opens (or initializes) the store under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::StorageError(format!("Failed to create {}: {}", dir.display(), e)))?;

        let local_path = dir.join(LOCAL_FILE);
        let sync_path = dir.join(SYNC_FILE);

        let local = read_scope::<LocalState>(&local_path)?.unwrap_or_default();
        let synced = read_scope::<SyncedPrefs>(&sync_path)?.unwrap_or_default();

        Ok(Self {
            local_path: Some(local_path),
            sync_path: Some(sync_path),
            local: Arc::new(RwLock::new(local)),
            synced: Arc::new(RwLock::new(synced)),
        })
    }

    /// In-memory store with persistence disabled. Used by tests.
    pub fn in_memory() -> Self {
        Self {
            local_path: None,
            sync_path: None,
            local: Arc::new(RwLock::new(LocalState::default())),
            synced: Arc::new(RwLock::new(SyncedPrefs::default())),
        }
    }

    pub async fn local(&self) -> LocalState {
        self.local.read().await.clone()
    }

    pub async fn synced(&self) -> SyncedPrefs {
        self.synced.read().await.clone()
    }

    /// Mutates local state and flushes it. The write lock is held
    /// through the flush so concurrent mutations serialize cleanly.
    pub async fn update_local<F>(&self, mutate: F) -> AppResult<()>
    where
        F: FnOnce(&mut LocalState),
    {
        let mut state = self.local.write().await;
        mutate(&mut state);
        write_scope(self.local_path.as_deref(), &*state)
    }

    pub async fn update_synced<F>(&self, mutate: F) -> AppResult<()>
    where
        F: FnOnce(&mut SyncedPrefs),
    {
        let mut prefs = self.synced.write().await;
        mutate(&mut prefs);
        write_scope(self.sync_path.as_deref(), &*prefs)
    }

    /// Clears the session: TokenState, the logged-in flag, discovery
    /// caches and the account-level fields. Configured credentials
    /// (client id/secret/refresh token) survive until the user edits
    /// them explicitly.
    pub async fn clear_session(&self) -> AppResult<()> {
        self.update_local(|state| {
            state.access_token = None;
            state.token_expiry = None;
            state.is_logged_in = false;
            state.region = None;
            state.account_id = None;
            state.inbox_folder_id = None;
            state.user_email = None;
            state.last_email_ids.clear();
        })
        .await
    }
}

fn read_scope<T: for<'de> Deserialize<'de>>(path: &Path) -> AppResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::StorageError(format!("Failed to read {}: {}", path.display(), e)))?;
    let value = serde_json::from_str(&contents)?;
    Ok(Some(value))
}

fn write_scope<T: Serialize>(path: Option<&Path>, value: &T) -> AppResult<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents)
        .map_err(|e| AppError::StorageError(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_state_uses_extension_storage_keys() {
        let mut state = LocalState::default();
        state.zoho_client_id = Some("id".into());
        state.token_expiry = Some(123);
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("zohoClientId").is_some());
        assert!(json.get("tokenExpiry").is_some());
        assert!(json.get("isLoggedIn").is_some());
    }

    #[test]
    fn test_synced_prefs_defaults() {
        let prefs = SyncedPrefs::default();
        assert!(prefs.notifications_enabled);
        assert_eq!(prefs.check_interval, 5);
        assert_eq!(prefs.max_emails, 20);
    }

    #[tokio::test]
    async fn test_clear_session_keeps_credentials() {
        let store = LocalStore::in_memory();
        store
            .update_local(|s| {
                s.zoho_client_id = Some("id".into());
                s.zoho_client_secret = Some("secret".into());
                s.zoho_refresh_token = Some("refresh".into());
                s.region = Some("in".into());
                s.access_token = Some("token".into());
                s.token_expiry = Some(42);
                s.is_logged_in = true;
                s.account_id = Some("acc".into());
                s.inbox_folder_id = Some("folder".into());
                s.user_email = Some("me@example.com".into());
                s.last_email_ids = vec!["1".into()];
            })
            .await
            .unwrap();

        store.clear_session().await.unwrap();

        let state = store.local().await;
        assert_eq!(state.zoho_client_id.as_deref(), Some("id"));
        assert_eq!(state.zoho_refresh_token.as_deref(), Some("refresh"));
        assert!(state.access_token.is_none());
        assert!(state.token_expiry.is_none());
        assert!(!state.is_logged_in);
        assert!(state.region.is_none());
        assert!(state.account_id.is_none());
        assert!(state.inbox_folder_id.is_none());
        assert!(state.user_email.is_none());
        assert!(state.last_email_ids.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = std::env::temp_dir().join(format!("zoho-bridge-store-{}", std::process::id()));
        let store = LocalStore::open(&dir).unwrap();
        store
            .update_local(|s| s.account_id = Some("acc-1".into()))
            .await
            .unwrap();

        let reopened = LocalStore::open(&dir).unwrap();
        assert_eq!(reopened.local().await.account_id.as_deref(), Some("acc-1"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
