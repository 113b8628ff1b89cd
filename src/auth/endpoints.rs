//! Regional endpoint tables for the Zoho accounts and mail hosts.
//!
//! The mapping is total: an unrecognized region code degrades to the
//! default region instead of failing, so callers never have to handle a
//! resolution error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Com,
    In,
    Eu,
    Au,
}

impl Region {
    pub const DEFAULT: Region = Region::Com;

    /// Parses a stored region code. Unknown codes fall back to the
    /// default region.
    pub fn parse(code: &str) -> Region {
        match code.trim().to_ascii_lowercase().as_str() {
            "com" => Region::Com,
            "in" => Region::In,
            "eu" => Region::Eu,
            "au" => Region::Au,
            _ => Region::DEFAULT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Com => "com",
            Region::In => "in",
            Region::Eu => "eu",
            Region::Au => "au",
        }
    }

    /// Accounts host used for authorization, token exchange and
    /// revocation.
    pub fn accounts_host(&self) -> &'static str {
        match self {
            Region::Com => "accounts.zoho.com",
            Region::In => "accounts.zoho.in",
            Region::Eu => "accounts.zoho.eu",
            Region::Au => "accounts.zoho.com.au",
        }
    }

    /// Mail API host for the region.
    pub fn mail_host(&self) -> &'static str {
        match self {
            Region::Com => "mail.zoho.com",
            Region::In => "mail.zoho.in",
            Region::Eu => "mail.zoho.eu",
            Region::Au => "mail.zoho.com.au",
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub authorize: String,
    pub token: String,
    pub revoke: String,
}

/// Resolves the OAuth endpoints for a region.
pub fn resolve(region: Region) -> AuthEndpoints {
    let host = region.accounts_host();
    AuthEndpoints {
        authorize: format!("https://{}/oauth/v2/auth", host),
        token: format!("https://{}/oauth/v2/token", host),
        revoke: format!("https://{}/oauth/v2/token/revoke", host),
    }
}

/// Resolves the mail API hostname for a region.
pub fn resolve_api_host(region: Region) -> &'static str {
    region.mail_host()
}
