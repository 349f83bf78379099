//! Data models for Budget Relay

mod alert;
mod envelope;

pub use alert::*;
pub use envelope::*;
