//! Cooldown policy between consecutive notifications

use chrono::{DateTime, Duration, Utc};

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// Decides whether an alert may be sent given the time of the last send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottlePolicy {
    min_interval_hours: f64,
}

impl ThrottlePolicy {
    /// Default minimum gap between notifications
    pub const DEFAULT_MIN_INTERVAL_HOURS: f64 = 4.0;

    /// Create a policy with the given minimum interval in hours
    pub fn new(min_interval_hours: f64) -> Self {
        Self { min_interval_hours }
    }

    /// Minimum interval in hours
    pub fn min_interval_hours(&self) -> f64 {
        self.min_interval_hours
    }

    /// Whether a notification may go out at `now`
    pub fn should_send(&self, now: DateTime<Utc>, last_sent: Option<DateTime<Utc>>) -> bool {
        should_send(now, last_sent, self.min_interval_hours)
    }

    /// Earliest instant at which the next notification is allowed.
    ///
    /// `None` when that instant lies beyond the representable date range.
    pub fn next_eligible_at(&self, last_sent: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // Float-to-int casts saturate, so huge intervals land on i64::MAX
        #[allow(clippy::cast_possible_truncation)]
        let micros = (self.min_interval_hours * MICROS_PER_HOUR).ceil() as i64;
        let candidate = last_sent.checked_add_signed(Duration::microseconds(micros))?;
        // The multiplication can round below the true product; never report an
        // instant that should_send would still reject.
        if self.should_send(candidate, Some(last_sent)) {
            Some(candidate)
        } else {
            candidate.checked_add_signed(Duration::microseconds(1))
        }
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_INTERVAL_HOURS)
    }
}

/// Fractional hours between `last_sent` and `now`; negative if `last_sent` is in the future.
pub fn elapsed_hours(now: DateTime<Utc>, last_sent: DateTime<Utc>) -> f64 {
    let elapsed = now - last_sent;
    #[allow(clippy::cast_precision_loss)]
    match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / MICROS_PER_HOUR,
        // Only reachable for gaps of hundreds of thousands of years
        None => elapsed.num_seconds() as f64 / 3600.0,
    }
}

/// Send when nothing was sent before, or when at least `min_interval_hours` have elapsed.
///
/// The comparison is inclusive: a gap of exactly the minimum interval sends.
pub fn should_send(
    now: DateTime<Utc>,
    last_sent: Option<DateTime<Utc>>,
    min_interval_hours: f64,
) -> bool {
    match last_sent {
        None => true,
        Some(last) => elapsed_hours(now, last) >= min_interval_hours,
    }
}
