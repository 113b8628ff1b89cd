//! # Zoho OAuth2 authentication
//!
//! Everything that touches credentials or tokens lives here.
//!
//! - `endpoints.rs`: pure region-to-host tables
//! - `session.rs`: the `AuthSession` owning credentials + token state
//! - `token_manager.rs`: refresh-token exchange, expiry, revocation

pub mod endpoints;
pub mod session;
pub mod token_manager;

pub use endpoints::{resolve, resolve_api_host, AuthEndpoints, Region};
pub use session::{AuthSession, Credentials, TokenState};
pub use token_manager::{TokenManager, DEFAULT_TOKEN_LIFETIME_SECS, EXPIRY_SKEW_MS};
