use tracing::{debug, error, info, warn};

pub fn log_server_startup(port: u16) {
    info!("🚀 Zoho Mail bridge relay starting on port {}", port);
}

pub fn log_server_ready(host: &str, port: u16) {
    info!("✅ Relay ready and listening on http://{}:{}", host, port);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_relay_forward(method: &str, path: &str, host: &str) {
    info!("Relay forward: {} {} -> {}", method, path, host);
}

pub fn log_relay_response(path: &str, status: u16) {
    info!("Relay response: {} - Status: {}", path, status);
}

pub fn log_token_exchange(host: &str) {
    info!("Token exchange -> {}", host);
}

pub fn log_api_error(endpoint: &str, status: Option<u16>, error: &str) {
    error!("Zoho API error: {} - Status: {:?} - Error: {}", endpoint, status, error);
}

pub fn log_poll_outcome(unread: usize, new_count: usize) {
    info!("Mail check complete: {} unread, {} new", unread, new_count);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
