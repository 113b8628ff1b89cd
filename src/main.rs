//! Relay binary.
//!
//! Runs the local CORS-bypassing relay the extension talks to. All
//! state lives in the extension; this process only forwards token
//! exchanges and mail-API calls to the regional Zoho hosts.

use std::sync::Arc;

use tokio::net::TcpListener;

use zoho_mail_bridge::config::Settings;
use zoho_mail_bridge::relay::{router, RelayState};
use zoho_mail_bridge::utils::logging::*;
use zoho_mail_bridge::utils::AppError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // In production there is no .env file; variables come from the
    // environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let settings = Settings::new()
        .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;
    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    let state = Arc::new(RelayState::new(&settings));
    let app = router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(settings.server.port);
    let host = settings.server.host.clone();

    log_server_startup(port);
    let listener = TcpListener::bind(format!("{}:{}", host, port)).await?;
    log_server_ready(&host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("Relay shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            log_error("Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log_error(&format!("Failed to install SIGTERM handler: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            log_info("Received SIGTERM, shutting down gracefully...");
        }
    }
}
