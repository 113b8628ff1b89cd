//! Zoho Mail API client.
//!
//! Every call goes through the local relay with the current access
//! token attached. Authentication expiry is handled transparently: a
//! 401 triggers one refresh and one retry of the original call, then
//! the failure surfaces as `SessionExpired`. A connection-level failure
//! reaching the relay is reported as `RelayUnavailable` because the
//! remediation (start the relay) differs from an API rejection.

use reqwest::{Client, Method};
use serde_json::{json, Value};

use crate::auth::TokenManager;
use crate::config::Settings;
use crate::store::LocalStore;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};

/// Folder names and paths recognized as the trash destination.
const TRASH_NAMES: [&str; 3] = ["trash", "bin", "deleted items"];
const TRASH_PATHS: [&str; 2] = ["/trash", "/bin"];

#[derive(Debug, Clone)]
pub struct EmailListOptions {
    pub folder_id: Option<String>,
    pub limit: usize,
    pub start: usize,
    /// "read", "unread" or "all".
    pub status: String,
    pub includeto: bool,
}

impl Default for EmailListOptions {
    fn default() -> Self {
        Self {
            folder_id: None,
            limit: 20,
            start: 1,
            status: "all".into(),
            includeto: true,
        }
    }
}

#[derive(Clone)]
pub struct ZohoMailService {
    http: Client,
    relay_base: String,
    tokens: TokenManager,
    store: LocalStore,
}

impl ZohoMailService {
    pub fn new(relay_base: impl Into<String>, tokens: TokenManager, store: LocalStore) -> Self {
        Self {
            http: Client::new(),
            relay_base: into_trimmed(relay_base),
            tokens,
            store,
        }
    }

    pub fn from_settings(settings: &Settings, tokens: TokenManager, store: LocalStore) -> Self {
        Self::new(settings.relay.base_url.clone(), tokens, store)
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Issues an authenticated request through the relay.
    ///
    /// Bounded retry: at most one refresh-and-retry on a 401, so an
    /// invalid refresh token can never loop.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> AppResult<Value> {
        let mut attempted_refresh = false;

        loop {
            let token = self.tokens.get_valid_access_token().await?;
            let region = self.store.local().await.region.unwrap_or_default();
            let region = crate::auth::Region::parse(&region);

            let url = format!("{}/api{}", self.relay_base, endpoint);
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("Zoho-oauthtoken {}", token))
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .header("X-Zoho-Region", region.as_str());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    return Err(AppError::RelayUnavailable(e.to_string()));
                }
                Err(e) => return Err(AppError::HttpError(e)),
            };

            let status = response.status();

            if status.as_u16() == 401 {
                if attempted_refresh {
                    return Err(AppError::SessionExpired);
                }
                attempted_refresh = true;
                // Propagates SessionExpired when the refresh token is gone.
                self.tokens.refresh_after_rejection(&token).await?;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = extract_error_message(&text, status.as_u16());
                log_api_error(endpoint, Some(status.as_u16()), &message);
                return Err(AppError::ApiError(message));
            }

            return Ok(response.json::<Value>().await?);
        }
    }

    async fn get(&self, endpoint: &str) -> AppResult<Value> {
        self.request(Method::GET, endpoint, None).await
    }

    async fn update_message(&self, account_id: &str, body: Value) -> AppResult<Value> {
        self.request(
            Method::PUT,
            &format!("/accounts/{}/updatemessage", account_id),
            Some(&body),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Accounts and folders
    // ------------------------------------------------------------------

    pub async fn get_accounts(&self) -> AppResult<Vec<Value>> {
        Ok(data_array(self.get("/accounts").await?))
    }

    pub async fn get_folders(&self, account_id: &str) -> AppResult<Vec<Value>> {
        Ok(data_array(
            self.get(&format!("/accounts/{}/folders", account_id)).await?,
        ))
    }

    pub async fn inbox_folder_id(&self, account_id: &str) -> AppResult<Option<String>> {
        let folders = self.get_folders(account_id).await?;
        Ok(folders.iter().find_map(|folder| {
            let name = field_lower(folder, "folderName");
            let path = field_lower(folder, "path");
            if name.as_deref() == Some("inbox") || path.as_deref() == Some("/inbox") {
                field_id(folder, "folderId")
            } else {
                None
            }
        }))
    }

    /// Lazily discovers the primary account and inbox folder, caching
    /// both in the local store. Redundant concurrent discovery is
    /// harmless: every caller converges on the provider's first account.
    pub async fn ensure_account(&self) -> AppResult<(String, Option<String>)> {
        let state = self.store.local().await;

        let account_id = match state.account_id {
            Some(id) => id,
            None => {
                let accounts = self.get_accounts().await?;
                let Some(first) = accounts.first() else {
                    return Err(AppError::ApiError("No mail accounts found".into()));
                };
                let Some(id) = field_id(first, "accountId") else {
                    return Err(AppError::ApiError("Account listing missing accountId".into()));
                };
                let email = first
                    .get("emailAddress")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let id_for_store = id.clone();
                self.store
                    .update_local(move |s| {
                        s.account_id = Some(id_for_store);
                        s.user_email = email;
                    })
                    .await?;
                id
            }
        };

        let inbox_folder_id = match state.inbox_folder_id {
            Some(id) => Some(id),
            None => {
                let found = self.inbox_folder_id(&account_id).await.unwrap_or(None);
                if let Some(ref id) = found {
                    let id = id.clone();
                    self.store
                        .update_local(move |s| s.inbox_folder_id = Some(id))
                        .await?;
                }
                found
            }
        };

        Ok((account_id, inbox_folder_id))
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub async fn get_emails(
        &self,
        account_id: &str,
        options: &EmailListOptions,
    ) -> AppResult<Vec<Value>> {
        let mut params = vec![
            ("limit", options.limit.to_string()),
            ("start", options.start.to_string()),
            ("status", options.status.clone()),
            ("includeto", options.includeto.to_string()),
            ("sortBy", "date".to_string()),
            // false sorts descending: newest first.
            ("sortorder", "false".to_string()),
        ];
        if let Some(folder_id) = &options.folder_id {
            params.push(("folderId", folder_id.clone()));
        }

        let endpoint = format!(
            "/accounts/{}/messages/view?{}",
            account_id,
            encode_query(&params)
        );
        Ok(data_array(self.get(&endpoint).await?))
    }

    pub async fn get_email_content(
        &self,
        account_id: &str,
        folder_id: &str,
        message_id: &str,
    ) -> AppResult<Value> {
        let endpoint = format!(
            "/accounts/{}/folders/{}/messages/{}/content?includeBlockContent=true",
            account_id, folder_id, message_id
        );
        Ok(data_object(self.get(&endpoint).await?))
    }

    pub async fn get_email_details(&self, account_id: &str, message_id: &str) -> AppResult<Value> {
        let endpoint = format!("/accounts/{}/messages/{}", account_id, message_id);
        Ok(data_object(self.get(&endpoint).await?))
    }

    pub async fn search_emails(&self, account_id: &str, search_key: &str) -> AppResult<Vec<Value>> {
        let endpoint = format!(
            "/accounts/{}/messages/search?searchKey={}&sortorder=false&limit=25",
            account_id,
            urlencoding::encode(search_key)
        );
        Ok(data_array(self.get(&endpoint).await?))
    }

    pub async fn send_email(
        &self,
        account_id: &str,
        to: &str,
        subject: &str,
        content: &str,
    ) -> AppResult<Value> {
        self.request(
            Method::POST,
            &format!("/accounts/{}/messages", account_id),
            Some(&json!({
                "toAddress": to,
                "subject": subject,
                "content": content,
            })),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Message mutations (all `updatemessage` with a mode discriminator)
    // ------------------------------------------------------------------

    pub async fn mark_as_read(&self, account_id: &str, message_ids: &[String]) -> AppResult<Value> {
        self.update_message(
            account_id,
            json!({ "mode": "markAsRead", "messageId": message_ids }),
        )
        .await
    }

    pub async fn mark_as_unread(
        &self,
        account_id: &str,
        message_ids: &[String],
    ) -> AppResult<Value> {
        self.update_message(
            account_id,
            json!({ "mode": "markAsUnread", "messageId": message_ids }),
        )
        .await
    }

    pub async fn archive_emails(
        &self,
        account_id: &str,
        message_ids: &[String],
    ) -> AppResult<Value> {
        self.update_message(
            account_id,
            json!({ "mode": "archive", "messageId": message_ids }),
        )
        .await
    }

    pub async fn mark_as_spam(&self, account_id: &str, message_ids: &[String]) -> AppResult<Value> {
        self.update_message(
            account_id,
            json!({ "mode": "markAsSpam", "messageId": message_ids }),
        )
        .await
    }

    /// Flag ids: 0 none, 1 info, 2 important, 3 followup.
    pub async fn set_flag(
        &self,
        account_id: &str,
        message_ids: &[String],
        flag_id: u8,
    ) -> AppResult<Value> {
        self.update_message(
            account_id,
            json!({ "mode": "setFlag", "messageId": message_ids, "flagid": flag_id }),
        )
        .await
    }

    /// Deletes by moving to the trash-like folder. The folder lookup
    /// runs first; when no recognized folder exists the operation fails
    /// with `TrashFolderNotFound` before any move is issued.
    pub async fn delete_emails(&self, account_id: &str, message_ids: &[String]) -> AppResult<Value> {
        let folders = self.get_folders(account_id).await?;
        let trash_id = folders.iter().find_map(|folder| {
            let name = field_lower(folder, "folderName");
            let path = field_lower(folder, "path");
            let name_matches = name
                .as_deref()
                .map(|n| TRASH_NAMES.contains(&n))
                .unwrap_or(false);
            let path_matches = path
                .as_deref()
                .map(|p| TRASH_PATHS.contains(&p))
                .unwrap_or(false);
            if name_matches || path_matches {
                field_id(folder, "folderId")
            } else {
                None
            }
        });

        let Some(trash_id) = trash_id else {
            log_warning("No trash-like folder found; delete aborted");
            return Err(AppError::TrashFolderNotFound);
        };

        self.update_message(
            account_id,
            json!({
                "mode": "moveMessage",
                "messageId": message_ids,
                "destfolderId": trash_id,
            }),
        )
        .await
    }
}

fn into_trimmed(base: impl Into<String>) -> String {
    let base: String = base.into();
    base.trim_end_matches('/').to_string()
}

/// The provider wraps results in an envelope; list-shaped endpoints
/// yield the `data` array or an empty one.
pub fn data_array(envelope: Value) -> Vec<Value> {
    envelope
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub fn data_object(envelope: Value) -> Value {
    envelope.get("data").cloned().unwrap_or_else(|| json!({}))
}

/// Prefers Zoho's embedded error message, then a generic `error` field,
/// then the raw status.
fn extract_error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .get("data")
            .and_then(|data| data.get("errorMessage"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    if body.trim().is_empty() {
        format!("API error: {}", status)
    } else {
        body.to_string()
    }
}

/// Provider identifiers arrive as strings or numbers; both are treated
/// as opaque strings locally.
fn field_id(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn field_lower(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_lowercase())
}

fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_array_falls_back_to_empty() {
        assert!(data_array(json!({ "status": { "code": 200 } })).is_empty());
        assert_eq!(
            data_array(json!({ "data": [1, 2] })),
            vec![json!(1), json!(2)]
        );
    }

    #[test]
    fn test_extract_error_prefers_provider_message() {
        let body = r#"{"data":{"errorMessage":"Invalid folder"},"status":{"code":400}}"#;
        assert_eq!(extract_error_message(body, 400), "Invalid folder");
        assert_eq!(
            extract_error_message(r#"{"error":"bad request"}"#, 400),
            "bad request"
        );
        assert_eq!(extract_error_message("", 503), "API error: 503");
    }

    #[test]
    fn test_field_id_accepts_numbers_and_strings() {
        assert_eq!(
            field_id(&json!({ "folderId": 42 }), "folderId").as_deref(),
            Some("42")
        );
        assert_eq!(
            field_id(&json!({ "folderId": "abc" }), "folderId").as_deref(),
            Some("abc")
        );
        assert!(field_id(&json!({}), "folderId").is_none());
    }

    #[test]
    fn test_encode_query_escapes_values() {
        let params = vec![("searchKey", "from:a b".to_string())];
        assert_eq!(encode_query(&params), "searchKey=from%3Aa%20b");
    }
}
