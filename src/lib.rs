// Zoho Mail bridge library.
// Exposes modules for use by the binaries and integration tests.

pub mod auth;
pub mod config;
pub mod relay;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use auth::{AuthSession, TokenManager};
use services::{Dispatcher, MailPoller, ZohoMailService};
use store::LocalStore;
use utils::AppResult;

/// Shared application state wired once at startup.
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: LocalStore,
    pub session: Arc<AuthSession>,
    pub tokens: TokenManager,
    pub mail: ZohoMailService,
    pub poller: Arc<MailPoller>,
}

impl AppState {
    pub fn initialize(settings: config::Settings) -> AppResult<Self> {
        let store = LocalStore::open(&settings.storage.dir)?;
        let session = AuthSession::new(store.clone());
        let tokens = TokenManager::new(session.clone());
        let mail = ZohoMailService::from_settings(&settings, tokens.clone(), store.clone());
        let poller = MailPoller::new(mail.clone(), store.clone());

        Ok(Self {
            settings,
            store,
            session,
            tokens,
            mail,
            poller,
        })
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.mail.clone(), self.poller.clone())
    }
}
