//! Error types for Budget Relay

use std::fmt;

use thiserror::Error;

use crate::alerting::{DecodeError, NotificationError};
use crate::db::StoreError;

/// Result type alias using Budget Relay's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which throttle store operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Opening the backend or running migrations
    Connect,
    /// Reading the last-sent record
    Read,
    /// Writing the last-sent record
    Write,
    /// Restoring the previous record after a failed delivery
    Rollback,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Read => "read",
            Self::Write => "write",
            Self::Rollback => "rollback",
        })
    }
}

/// Coarse fault classification, for callers that route on failure type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Malformed upstream payload
    Decode,
    /// Throttle store unavailable or misbehaving
    Store,
    /// Webhook delivery failed
    Notify,
    /// Invalid configuration
    Config,
    /// Anything else
    Internal,
}

/// Error types for Budget Relay operations
#[derive(Error, Debug)]
pub enum Error {
    /// Event payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Throttle store error
    #[error("Throttle store {op} failed: {source}")]
    Store {
        /// Operation that failed
        op: StoreOp,
        /// Backend error
        #[source]
        source: StoreError,
    },

    /// Webhook notification error
    #[error("Notification failed: {0}")]
    Notify(#[from] NotificationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a store error for the given operation
    pub fn store(op: StoreOp, source: StoreError) -> Self {
        Self::Store { op, source }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Decode(_) | Self::Serialization(_) => FaultKind::Decode,
            Self::Store { .. } => FaultKind::Store,
            Self::Notify(_) => FaultKind::Notify,
            Self::Config(_) => FaultKind::Config,
            Self::Internal(_) | Self::Io(_) => FaultKind::Internal,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
