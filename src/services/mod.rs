pub mod dispatcher;
pub mod mail_api;
pub mod poller;

pub use dispatcher::{Dispatcher, UiRequest};
pub use mail_api::{EmailListOptions, ZohoMailService};
pub use poller::{badge_text, MailNotification, MailPoller, PollOutcome};
