//! Throttle state storage
//!
//! Holds the single "last sent" record behind the [`ThrottleStore`] trait, with
//! in-memory, Redis and PostgreSQL backends.

mod memory;
mod postgres;
mod redis;

pub use memory::MemoryThrottleStore;
pub use postgres::PostgresThrottleStore;
pub use redis::RedisThrottleStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{Error, Result, StoreOp};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// PostgreSQL failure
    #[error("Database error: {0}")]
    Database(String),

    /// Redis failure
    #[error("Redis error: {0}")]
    Redis(String),

    /// Stored value could not be parsed
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

/// Durable single-record store for the time of the last delivered alert.
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// Time of the last successful send, if one was ever recorded
    async fn get_last_sent(&self) -> std::result::Result<Option<DateTime<Utc>>, StoreError>;

    /// Overwrite the record unconditionally
    async fn set_last_sent(&self, at: DateTime<Utc>) -> std::result::Result<(), StoreError>;

    /// Atomically replace the record if it still holds `expected`.
    ///
    /// `None` on either side means "no timestamp". Returns whether the write happened.
    async fn compare_and_set(
        &self,
        expected: Option<DateTime<Utc>>,
        new: Option<DateTime<Utc>>,
    ) -> std::result::Result<bool, StoreError>;

    /// Check backend connectivity
    async fn health_check(&self) -> std::result::Result<(), StoreError> {
        Ok(())
    }

    /// Short backend name for logs and status output
    fn backend(&self) -> &'static str;
}

/// Open the configured backend
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn ThrottleStore>> {
    let store: Arc<dyn ThrottleStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryThrottleStore::new()),
        StoreBackend::Redis => Arc::new(
            RedisThrottleStore::new(config).map_err(|e| Error::store(StoreOp::Connect, e))?,
        ),
        StoreBackend::Postgres => {
            let store = PostgresThrottleStore::new(config)
                .await
                .map_err(|e| Error::store(StoreOp::Connect, e))?;
            if config.run_migrations {
                store
                    .migrate()
                    .await
                    .map_err(|e| Error::store(StoreOp::Connect, e))?;
            }
            Arc::new(store)
        }
    };

    info!(
        backend = store.backend(),
        collection = %config.collection,
        document = %config.document,
        "Throttle store ready"
    );

    Ok(store)
}
