//! Event handling: decode, throttle, notify, record

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, error, info, warn};

use super::decoder::{self, DecodeError};
use super::notifier::WebhookNotifier;
use super::throttle::{elapsed_hours, ThrottlePolicy};
use crate::config::{Config, WriteMode};
use crate::db::{self, ThrottleStore};
use crate::error::{Error, Result, StoreOp};
use crate::models::{AlertRecord, Outcome, PushEnvelope, SkipReason};

/// Forwards budget alerts to the webhook, at most once per throttle window.
///
/// Built once per process and shared across invocations.
pub struct BudgetAlertRelay {
    store: Arc<dyn ThrottleStore>,
    notifier: WebhookNotifier,
    policy: ThrottlePolicy,
    write_mode: WriteMode,
}

impl BudgetAlertRelay {
    /// Create a relay from its parts
    pub fn new(
        store: Arc<dyn ThrottleStore>,
        notifier: WebhookNotifier,
        policy: ThrottlePolicy,
        write_mode: WriteMode,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
            write_mode,
        }
    }

    /// Connect the store and build the notifier from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate_for_delivery()?;

        let store = db::connect(&config.store).await?;
        let notifier =
            WebhookNotifier::new(&config.notifier).map_err(|e| Error::config(e.to_string()))?;

        Ok(Self::new(
            store,
            notifier,
            ThrottlePolicy::new(config.throttle.min_interval_hours),
            config.throttle.write_mode,
        ))
    }

    /// Throttle store in use
    pub fn store(&self) -> &Arc<dyn ThrottleStore> {
        &self.store
    }

    /// Throttle policy in use
    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// Write strategy in use
    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Handle one envelope using the current time
    pub async fn handle(&self, envelope: &PushEnvelope) -> Result<Outcome> {
        // Microseconds are the finest precision every backend persists exactly
        let now = Utc::now().trunc_subsecs(6);
        self.handle_at(envelope, now).await
    }

    /// Handle one envelope as if it arrived at `now`
    pub async fn handle_at(&self, envelope: &PushEnvelope, now: DateTime<Utc>) -> Result<Outcome> {
        let record = match decoder::decode(envelope) {
            Ok(record) => record,
            Err(DecodeError::Missing(part)) => {
                let reason = SkipReason::from(part);
                info!(?reason, "Envelope carried no alert, skipping");
                return Ok(reason.into());
            }
            Err(e) => {
                error!(message_id = ?envelope.message_id(), error = %e, "Failed to decode alert");
                return Err(e.into());
            }
        };

        info!(
            message_id = ?envelope.message_id(),
            budget = ?record.budget_name(),
            cost = ?record.cost(),
            threshold = ?record.threshold(),
            "Received budget alert"
        );

        let last_sent = self.store.get_last_sent().await.map_err(|e| {
            error!(backend = self.store.backend(), error = %e, "Failed to read throttle record");
            Error::store(StoreOp::Read, e)
        })?;

        if let Some(last) = last_sent {
            debug!(elapsed_hours = elapsed_hours(now, last), "Last alert found");
        }

        if !self.policy.should_send(now, last_sent) {
            info!(
                last_sent = ?last_sent,
                min_interval_hours = self.policy.min_interval_hours(),
                "Skipping alert, throttled"
            );
            return Ok(SkipReason::Throttled.into());
        }

        match self.write_mode {
            WriteMode::LastWriterWins => {
                self.deliver(&record).await?;
                self.store.set_last_sent(now).await.map_err(|e| {
                    error!(
                        backend = self.store.backend(),
                        error = %e,
                        "Alert delivered but the send time was not recorded"
                    );
                    Error::store(StoreOp::Write, e)
                })?;
            }
            WriteMode::Claim => {
                if !self.claim(last_sent, now).await? {
                    info!("Another invocation claimed this window, skipping");
                    return Ok(SkipReason::Throttled.into());
                }
                if let Err(e) = self.deliver(&record).await {
                    self.release(last_sent, now).await;
                    return Err(e);
                }
            }
        }

        info!(sent_at = %now, "Alert sent");
        Ok(Outcome::Sent { at: now })
    }

    async fn deliver(&self, record: &AlertRecord) -> Result<()> {
        let message = self.notifier.format_message(record);
        self.notifier.send(&message).await.map_err(|e| {
            error!(error = %e, "Webhook delivery failed");
            Error::from(e)
        })
    }

    async fn claim(&self, last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<bool> {
        self.store
            .compare_and_set(last_sent, Some(now))
            .await
            .map_err(|e| {
                error!(backend = self.store.backend(), error = %e, "Failed to claim throttle window");
                Error::store(StoreOp::Write, e)
            })
    }

    /// Put back the record that was there before a failed delivery
    async fn release(&self, last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        match self.store.compare_and_set(Some(now), last_sent).await {
            Ok(true) => debug!("Released throttle claim"),
            Ok(false) => warn!("Throttle record changed since claim, leaving it in place"),
            Err(e) => {
                let err = Error::store(StoreOp::Rollback, e);
                error!(error = %err, "Failed to release throttle claim");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierConfig;
    use crate::db::MemoryThrottleStore;
    use chrono::TimeZone;

    fn relay(store: Arc<dyn ThrottleStore>) -> BudgetAlertRelay {
        // Never contacted by these tests
        let notifier = WebhookNotifier::new(&NotifierConfig {
            webhook_url: "http://127.0.0.1:1/hook".to_string(),
            ..NotifierConfig::default()
        })
        .unwrap();
        BudgetAlertRelay::new(store, notifier, ThrottlePolicy::default(), WriteMode::default())
    }

    #[tokio::test]
    async fn test_missing_parts_are_soft() {
        let relay = relay(Arc::new(MemoryThrottleStore::new()));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let outcome = relay.handle_at(&PushEnvelope::default(), now).await.unwrap();
        assert_eq!(outcome.to_string(), "No message");

        let outcome = relay.handle_at(&PushEnvelope::with_data(""), now).await.unwrap();
        assert_eq!(outcome.to_string(), "No data");
    }

    #[tokio::test]
    async fn test_throttled_without_touching_notifier() {
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let store = Arc::new(MemoryThrottleStore::with_last_sent(last));
        let relay = relay(store.clone());

        let outcome = relay
            .handle_at(&PushEnvelope::with_data("e30="), last + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::from(SkipReason::Throttled));
        assert_eq!(store.get_last_sent().await.unwrap(), Some(last));
    }

    #[tokio::test]
    async fn test_decode_fault_is_error() {
        let relay = relay(Arc::new(MemoryThrottleStore::new()));
        let err = relay
            .handle(&PushEnvelope::with_data("%%%"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::FaultKind::Decode);
    }
}
