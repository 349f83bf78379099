//! PostgreSQL-backed throttle store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{StoreError, ThrottleStore};
use crate::config::StoreConfig;

/// Throttle record stored as one row of `alert_state`
#[derive(Clone)]
pub struct PostgresThrottleStore {
    pool: PgPool,
    collection: String,
    key: String,
}

impl PostgresThrottleStore {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        Ok(Self::with_pool(pool, config))
    }

    /// Wrap an existing pool
    pub fn with_pool(pool: PgPool, config: &StoreConfig) -> Self {
        Self {
            pool,
            collection: config.collection.clone(),
            key: config.document.clone(),
        }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ThrottleStore for PostgresThrottleStore {
    async fn get_last_sent(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        // Outer Option: row exists; inner: timestamp column set
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            r#"SELECT "timestamp" FROM alert_state WHERE collection = $1 AND key = $2"#,
        )
        .bind(&self.collection)
        .bind(&self.key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(timestamp,)| timestamp))
    }

    async fn set_last_sent(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO alert_state (collection, key, "timestamp")
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key) DO UPDATE SET "timestamp" = EXCLUDED."timestamp"
            "#,
        )
        .bind(&self.collection)
        .bind(&self.key)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn compare_and_set(
        &self,
        expected: Option<DateTime<Utc>>,
        new: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let result = match expected {
            // No row, or a row without a timestamp
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO alert_state (collection, key, "timestamp")
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, key) DO UPDATE SET "timestamp" = EXCLUDED."timestamp"
                    WHERE alert_state."timestamp" IS NULL
                    "#,
                )
                .bind(&self.collection)
                .bind(&self.key)
                .bind(new)
                .execute(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE alert_state SET "timestamp" = $3
                    WHERE collection = $1 AND key = $2 AND "timestamp" = $4
                    "#,
                )
                .bind(&self.collection)
                .bind(&self.key)
                .bind(new)
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
