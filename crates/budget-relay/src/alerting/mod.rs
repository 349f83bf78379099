//! Budget alert relaying
//!
//! Decodes pushed billing alerts, applies the cooldown window and delivers the
//! message to the chat webhook.

mod decoder;
mod notifier;
mod relay;
mod throttle;

pub use decoder::{decode, DecodeError, MissingPart};
pub use notifier::{NotificationError, WebhookNotifier};
pub use relay::BudgetAlertRelay;
pub use throttle::{elapsed_hours, should_send, ThrottlePolicy};
