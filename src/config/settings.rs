use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub relay: RelaySettings,
    pub storage: StorageSettings,
}

/// Where the relay binary binds. The relay is local-only by design; any
/// local process may call it (known limitation, see DESIGN.md).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelaySettings {
    /// How the client side reaches the relay.
    pub base_url: String,
    /// Override for the regional accounts host (used by tests; normally
    /// unset so the per-region table applies).
    pub accounts_base_url: Option<String>,
    /// Override for the regional mail API host.
    pub mail_base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageSettings {
    /// Directory holding local.json and sync.json.
    pub dir: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3847)?
            .set_default("relay.base_url", "http://127.0.0.1:3847")?
            .set_default("storage.dir", ".")?
            // Base configuration file
            .add_source(File::with_name("config/default").required(false))
            // Environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        // Targeted environment overrides
        if let Ok(base_url) = std::env::var("ZOHO_RELAY_BASE_URL") {
            builder = builder.set_override("relay.base_url", base_url)?;
        }
        if let Ok(dir) = std::env::var("ZOHO_STORAGE_DIR") {
            builder = builder.set_override("storage.dir", dir)?;
        }

        builder = builder.add_source(Environment::with_prefix("ZOHO_BRIDGE").separator("__"));

        let s = builder.build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::new().expect("defaults should load without files");
        assert_eq!(settings.server.port, 3847);
        assert_eq!(settings.relay.base_url, "http://127.0.0.1:3847");
        assert!(settings.relay.accounts_base_url.is_none());
    }
}
