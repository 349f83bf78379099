//! # Budget Relay
//!
//! Relays cloud billing budget alerts to a chat webhook.
//!
//! Each pushed alert is decoded, checked against a cooldown window backed by a
//! single stored timestamp, and forwarded as a short chat message when the window
//! has passed.
//!
//! ## Architecture
//!
//! - **Alerting**: decoder, throttle policy, webhook notifier and the relay that composes them
//! - **Storage**: the "last sent" record in memory, Redis or PostgreSQL
//! - **API**: HTTP push endpoint for the messaging platform
//!
//! ## Quick Start
//!
//! ```bash
//! export BUDGET_RELAY__NOTIFIER__WEBHOOK_URL=https://hooks.slack.com/services/...
//!
//! # Receive pushes
//! budget-relay serve
//!
//! # Or handle a single envelope
//! budget-relay handle --file envelope.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{BudgetAlertRelay, ThrottlePolicy, WebhookNotifier};
    pub use crate::config::Config;
    pub use crate::db::ThrottleStore;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}
