//! Budget alert data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A budget alert as published by the billing platform.
///
/// Every field is optional and loosely typed: the payload is forwarded as-is, so a
/// field of an unexpected JSON type is kept rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Display name of the budget
    #[serde(default)]
    pub budget_display_name: Option<Value>,

    /// Cost accrued in the current budget period
    #[serde(default)]
    pub cost_amount: Option<Value>,

    /// ISO 4217 currency code for both amounts
    #[serde(default)]
    pub currency_code: Option<Value>,

    /// Configured budget amount
    #[serde(default)]
    pub budget_amount: Option<Value>,

    /// Threshold fraction that was crossed (e.g. `1.2` for 120%)
    #[serde(default)]
    pub alert_threshold_exceeded: Option<Value>,
}

impl AlertRecord {
    /// Budget name as plain text, if it is a string
    pub fn budget_name(&self) -> Option<&str> {
        self.budget_display_name.as_ref().and_then(Value::as_str)
    }

    /// Cost as a float, if it is numeric
    pub fn cost(&self) -> Option<f64> {
        self.cost_amount.as_ref().and_then(Value::as_f64)
    }

    /// Threshold as a float, if it is numeric
    pub fn threshold(&self) -> Option<f64> {
        self.alert_threshold_exceeded.as_ref().and_then(Value::as_f64)
    }
}

/// Render an optional payload field for a chat message.
///
/// Absent and `null` render empty, strings render unquoted, everything else renders
/// as compact JSON (so numbers keep their original text, `120` stays `120`).
pub fn render_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Reason an invocation ended without sending anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Envelope carried no message
    NoMessage,
    /// Message carried no data
    NoData,
    /// Last alert was sent within the throttle window
    Throttled,
}

/// Successful result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing was sent
    Skipped {
        /// Why
        reason: SkipReason,
    },
    /// The alert was delivered and recorded
    Sent {
        /// Send time written to the throttle store
        at: DateTime<Utc>,
    },
}

impl Outcome {
    /// Whether a notification went out
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

impl From<SkipReason> for Outcome {
    fn from(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Skipped { reason: SkipReason::NoMessage } => "No message",
            Self::Skipped { reason: SkipReason::NoData } => "No data",
            Self::Skipped { reason: SkipReason::Throttled } => "Throttled",
            Self::Sent { .. } => "Alert sent",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_field() {
        assert_eq!(render_field(None), "");
        assert_eq!(render_field(Some(&Value::Null)), "");
        assert_eq!(render_field(Some(&json!("Eng"))), "Eng");
        assert_eq!(render_field(Some(&json!(120))), "120");
        assert_eq!(render_field(Some(&json!(1.2))), "1.2");
        assert_eq!(render_field(Some(&json!(true))), "true");
        assert_eq!(render_field(Some(&json!({"a": 1}))), r#"{"a":1}"#);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::from(SkipReason::NoMessage).to_string(), "No message");
        assert_eq!(Outcome::from(SkipReason::NoData).to_string(), "No data");
        assert_eq!(Outcome::from(SkipReason::Throttled).to_string(), "Throttled");
        assert_eq!(Outcome::Sent { at: Utc::now() }.to_string(), "Alert sent");
    }

    #[test]
    fn test_typed_accessors() {
        let record: AlertRecord = serde_json::from_value(json!({
            "budgetDisplayName": "Eng",
            "costAmount": 120,
            "alertThresholdExceeded": "high"
        }))
        .unwrap();

        assert_eq!(record.budget_name(), Some("Eng"));
        assert_eq!(record.cost(), Some(120.0));
        assert_eq!(record.threshold(), None);
        assert!(record.currency_code.is_none());
    }
}
