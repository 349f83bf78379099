//! Process-local throttle store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{StoreError, ThrottleStore};

/// In-memory throttle store. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryThrottleStore {
    last_sent: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryThrottleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a send time
    pub fn with_last_sent(at: DateTime<Utc>) -> Self {
        Self {
            last_sent: Mutex::new(Some(at)),
        }
    }
}

#[async_trait]
impl ThrottleStore for MemoryThrottleStore {
    async fn get_last_sent(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(*self.last_sent.lock())
    }

    async fn set_last_sent(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        *self.last_sent.lock() = Some(at);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        expected: Option<DateTime<Utc>>,
        new: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut current = self.last_sent.lock();
        if *current != expected {
            return Ok(false);
        }
        *current = new;
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryThrottleStore::new();
        assert_eq!(store.get_last_sent().await.unwrap(), None);

        let first = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap();
        store.set_last_sent(first).await.unwrap();
        store.set_last_sent(second).await.unwrap();
        store.set_last_sent(second).await.unwrap();

        assert_eq!(store.get_last_sent().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap();
        let store = MemoryThrottleStore::new();

        assert!(store.compare_and_set(None, Some(t1)).await.unwrap());
        // Stale expectation loses
        assert!(!store.compare_and_set(None, Some(t2)).await.unwrap());
        assert_eq!(store.get_last_sent().await.unwrap(), Some(t1));

        assert!(store.compare_and_set(Some(t1), Some(t2)).await.unwrap());
        assert!(store.compare_and_set(Some(t2), None).await.unwrap());
        assert_eq!(store.get_last_sent().await.unwrap(), None);
    }
}
