//! Background mail polling.
//!
//! Periodically checks the inbox for unread mail, diffs message ids
//! against the previous check to detect genuinely new messages, and
//! produces the badge text the UI shows. The scheduler is a spawned
//! interval loop gated by a running flag so it can be stopped and
//! restarted when the user changes the check interval.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::services::mail_api::{EmailListOptions, ZohoMailService};
use crate::store::LocalStore;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};

/// At most this many notifications per check, oldest dropped first.
const MAX_NOTIFICATIONS: usize = 3;

/// Badge text shown on authentication failure.
const BADGE_AUTH_FAILURE: &str = "!";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailNotification {
    pub message_id: String,
    pub folder_id: Option<String>,
    pub sender: String,
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollOutcome {
    pub unread_count: usize,
    pub new_messages: Vec<MailNotification>,
    pub badge: String,
}

pub struct MailPoller {
    mail: ZohoMailService,
    store: LocalStore,
    running: RwLock<bool>,
    badge: RwLock<String>,
}

impl MailPoller {
    pub fn new(mail: ZohoMailService, store: LocalStore) -> Arc<Self> {
        Arc::new(Self {
            mail,
            store,
            running: RwLock::new(false),
            badge: RwLock::new(String::new()),
        })
    }

    /// Badge text from the most recent check.
    pub async fn badge(&self) -> String {
        self.badge.read().await.clone()
    }

    /// One poll cycle. Returns an empty outcome without touching the
    /// network when no session is active.
    pub async fn check_for_new_emails(&self) -> AppResult<PollOutcome> {
        let state = self.store.local().await;
        if !state.is_logged_in {
            return Ok(PollOutcome::default());
        }

        let prefs = self.store.synced().await;
        let (account_id, inbox_folder_id) = self.mail.ensure_account().await?;

        let options = EmailListOptions {
            folder_id: inbox_folder_id,
            limit: prefs.max_emails,
            status: "unread".into(),
            ..Default::default()
        };
        let emails = self.mail.get_emails(&account_id, &options).await?;

        let current_ids: Vec<String> = emails.iter().filter_map(message_id).collect();
        let previous_ids = state.last_email_ids;

        let new_messages: Vec<MailNotification> = emails
            .iter()
            .filter(|email| {
                message_id(email)
                    .map(|id| !previous_ids.contains(&id))
                    .unwrap_or(false)
            })
            .take(MAX_NOTIFICATIONS)
            .map(notification_from)
            .collect();

        let ids_for_store = current_ids.clone();
        self.store
            .update_local(move |s| s.last_email_ids = ids_for_store)
            .await?;

        let outcome = PollOutcome {
            unread_count: emails.len(),
            badge: badge_text(emails.len()),
            new_messages,
        };
        log_poll_outcome(outcome.unread_count, outcome.new_messages.len());
        Ok(outcome)
    }

    /// Starts the periodic check loop. Idempotent: a second call while
    /// running is a no-op.
    pub async fn start_scheduler(self: &Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                log_warning("Mail poller already running");
                return;
            }
            *running = true;
        }

        let minutes = self.store.synced().await.check_interval.max(1);
        log_info(&format!("Mail poller started, checking every {} minutes", minutes));

        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
            // The first tick fires immediately; skip it so startup does
            // not race the initial manual check.
            interval.tick().await;

            loop {
                interval.tick().await;
                if !*poller.running.read().await {
                    log_info("Mail poller stopped");
                    break;
                }

                match poller.check_for_new_emails().await {
                    Ok(outcome) => {
                        *poller.badge.write().await = outcome.badge;
                    }
                    Err(AppError::SessionExpired) | Err(AppError::CredentialsMissing) => {
                        // Auth failures surface on the badge so the user
                        // notices without opening the popup.
                        log_warning("Mail check failed: session expired");
                        *poller.badge.write().await = BADGE_AUTH_FAILURE.into();
                    }
                    Err(e) => log_error(&format!("Mail check failed: {}", e)),
                }
            }
        });
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Badge rules: empty for zero, capped at "99+".
pub fn badge_text(count: usize) -> String {
    match count {
        0 => String::new(),
        n if n > 99 => "99+".into(),
        n => n.to_string(),
    }
}

fn message_id(email: &Value) -> Option<String> {
    match email.get("messageId") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn notification_from(email: &Value) -> MailNotification {
    let sender = email
        .get("sender")
        .or_else(|| email.get("fromAddress"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown sender")
        .to_string();
    let subject = email
        .get("subject")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("(No Subject)")
        .to_string();
    let folder_id = email
        .get("folderId")
        .and_then(Value::as_str)
        .map(str::to_string);

    MailNotification {
        message_id: message_id(email).unwrap_or_default(),
        folder_id,
        sender,
        subject,
    }
}
