//! Background mail agent.
//!
//! Headless companion to the relay: owns the token lifecycle and the
//! periodic mail check, persisting session state through the local
//! store. Runs until interrupted.

use zoho_mail_bridge::config::Settings;
use zoho_mail_bridge::utils::logging::*;
use zoho_mail_bridge::utils::AppError;
use zoho_mail_bridge::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let settings = Settings::new()
        .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;
    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    let state = AppState::initialize(settings)?;

    if state.session.is_logged_in().await {
        log_info("Existing session found, starting mail poller");
    } else {
        log_warning("No active session; poller will idle until login");
    }

    state.poller.start_scheduler().await;

    tokio::signal::ctrl_c().await?;
    log_info("Received Ctrl+C, stopping mail poller...");
    state.poller.stop().await;

    Ok(())
}
