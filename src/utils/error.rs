use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Local precondition: client id/secret/refresh token not configured.
    CredentialsMissing,
    /// The refresh token was rejected; local session state has been cleared.
    SessionExpired,
    /// The local relay process could not be reached at all.
    RelayUnavailable(String),
    /// The provider rejected a specific API operation.
    ApiError(String),
    /// Delete requires a trash-like folder and none was found.
    TrashFolderNotFound,
    /// The UI sent a message with an unrecognized action discriminator.
    UnknownAction(String),
    ConfigError(String),
    StorageError(String),
    JsonError(serde_json::Error),
    HttpError(reqwest::Error),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::CredentialsMissing => write!(
                f,
                "Credentials not configured. Please go to Settings and enter your Zoho API credentials."
            ),
            AppError::SessionExpired => write!(f, "Session expired, please login again"),
            AppError::RelayUnavailable(msg) => write!(
                f,
                "Relay server not running ({}). Please start the local relay first.",
                msg
            ),
            AppError::ApiError(msg) => write!(f, "Zoho API error: {}", msg),
            AppError::TrashFolderNotFound => {
                write!(f, "Trash folder not found. Please check your folder names.")
            }
            AppError::UnknownAction(action) => write!(f, "Unknown action: {}", action),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::JsonError(err) => write!(f, "JSON error: {}", err),
            AppError::HttpError(err) => write!(f, "HTTP error: {}", err),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::CredentialsMissing => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::SessionExpired => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::RelayUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::ApiError(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::TrashFolderNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::UnknownAction(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::StorageError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::JsonError(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::HttpError(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = json!({
            "error": error_message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
