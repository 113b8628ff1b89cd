//! Action dispatcher.
//!
//! The UI sends requests as JSON objects with a string `action`
//! discriminator. Known actions deserialize into a typed request and
//! run against the mail service; anything else is rejected by name.
//! Every failure is folded into an `{ "error": ... }` value so the
//! caller always receives a JSON answer.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::services::mail_api::{EmailListOptions, ZohoMailService};
use crate::services::poller::MailPoller;
use crate::utils::{AppError, AppResult};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UiRequest {
    CheckEmails,
    #[serde(rename_all = "camelCase")]
    GetEmails {
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        status: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MarkAsRead { message_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    MarkAsUnread { message_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    DeleteEmails { message_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    ArchiveEmails { message_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    MarkAsSpam { message_ids: Vec<String> },
    UpdateBadge { count: usize },
}

pub struct Dispatcher {
    mail: ZohoMailService,
    poller: Arc<MailPoller>,
}

impl Dispatcher {
    pub fn new(mail: ZohoMailService, poller: Arc<MailPoller>) -> Self {
        Self { mail, poller }
    }

    /// Runs a raw UI request, folding any failure into an error value.
    pub async fn dispatch(&self, request: Value) -> Value {
        match self.handle(request).await {
            Ok(value) => value,
            Err(e) => json!({ "error": e.to_string() }),
        }
    }

    async fn handle(&self, request: Value) -> AppResult<Value> {
        // The discriminator is checked first so an unknown action is
        // reported by name instead of as a shape mismatch.
        let action = request
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let request: UiRequest = match serde_json::from_value(request) {
            Ok(parsed) => parsed,
            Err(e) if known_action(&action) => return Err(AppError::JsonError(e)),
            Err(_) => return Err(AppError::UnknownAction(action)),
        };

        match request {
            UiRequest::CheckEmails => {
                let outcome = self.poller.check_for_new_emails().await?;
                Ok(serde_json::to_value(outcome)?)
            }
            UiRequest::GetEmails { limit, status } => {
                let (account_id, inbox_folder_id) = self.mail.ensure_account().await?;
                let mut options = EmailListOptions {
                    folder_id: inbox_folder_id,
                    ..Default::default()
                };
                if let Some(limit) = limit {
                    options.limit = limit;
                }
                if let Some(status) = status {
                    options.status = status;
                }
                let emails = self.mail.get_emails(&account_id, &options).await?;
                Ok(json!({ "emails": emails }))
            }
            UiRequest::MarkAsRead { message_ids } => {
                let (account_id, _) = self.mail.ensure_account().await?;
                self.mail.mark_as_read(&account_id, &message_ids).await
            }
            UiRequest::MarkAsUnread { message_ids } => {
                let (account_id, _) = self.mail.ensure_account().await?;
                self.mail.mark_as_unread(&account_id, &message_ids).await
            }
            UiRequest::DeleteEmails { message_ids } => {
                let (account_id, _) = self.mail.ensure_account().await?;
                self.mail.delete_emails(&account_id, &message_ids).await
            }
            UiRequest::ArchiveEmails { message_ids } => {
                let (account_id, _) = self.mail.ensure_account().await?;
                self.mail.archive_emails(&account_id, &message_ids).await
            }
            UiRequest::MarkAsSpam { message_ids } => {
                let (account_id, _) = self.mail.ensure_account().await?;
                self.mail.mark_as_spam(&account_id, &message_ids).await
            }
            UiRequest::UpdateBadge { count } => {
                Ok(json!({ "badge": crate::services::poller::badge_text(count) }))
            }
        }
    }
}

fn known_action(action: &str) -> bool {
    matches!(
        action,
        "checkEmails"
            | "getEmails"
            | "markAsRead"
            | "markAsUnread"
            | "deleteEmails"
            | "archiveEmails"
            | "markAsSpam"
            | "updateBadge"
    )
}
