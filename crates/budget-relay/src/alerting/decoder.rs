//! Decoding of budget alerts out of push envelopes

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};

use crate::models::{AlertRecord, PushEnvelope, SkipReason};

/// Part of the envelope that was absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPart {
    /// No `message` object
    Message,
    /// No (or empty) `message.data`
    Data,
}

impl From<MissingPart> for SkipReason {
    fn from(part: MissingPart) -> Self {
        match part {
            MissingPart::Message => SkipReason::NoMessage,
            MissingPart::Data => SkipReason::NoData,
        }
    }
}

/// Decoding errors.
///
/// `Missing` is a normal early exit; every other variant means the upstream payload is
/// malformed and should be treated as a fault.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Message or data absent
    #[error("envelope has no {0:?}")]
    Missing(MissingPart),

    /// Data is not valid base64
    #[error("invalid base64 in message data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes are not UTF-8
    #[error("message data is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Decoded text is not a JSON object
    #[error("message data is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    /// Whether this is a soft no-op rather than a fault
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

/// Extract the alert record carried by an envelope
pub fn decode(envelope: &PushEnvelope) -> Result<AlertRecord, DecodeError> {
    let message = envelope
        .message
        .as_ref()
        .ok_or(DecodeError::Missing(MissingPart::Message))?;

    let data = message
        .data
        .as_deref()
        .filter(|data| !data.is_empty())
        .ok_or(DecodeError::Missing(MissingPart::Data))?;

    let bytes = STANDARD.decode(data.trim())?;
    let text = String::from_utf8(bytes)?;

    // Parse as a map first so arrays and scalars are rejected instead of
    // being matched positionally against the record fields.
    let payload: Map<String, Value> = serde_json::from_str(&text)?;
    let record = serde_json::from_value(Value::Object(payload))?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PubSubMessage;
    use serde_json::json;

    fn encode(payload: &str) -> PushEnvelope {
        PushEnvelope::with_data(STANDARD.encode(payload))
    }

    #[test]
    fn test_decode_full_payload() {
        let envelope = encode(
            r#"{"budgetDisplayName":"Eng","costAmount":120,"currencyCode":"USD","budgetAmount":100,"alertThresholdExceeded":1.2}"#,
        );

        let record = decode(&envelope).unwrap();
        assert_eq!(record.budget_display_name, Some(json!("Eng")));
        assert_eq!(record.cost_amount, Some(json!(120)));
        assert_eq!(record.currency_code, Some(json!("USD")));
        assert_eq!(record.budget_amount, Some(json!(100)));
        assert_eq!(record.alert_threshold_exceeded, Some(json!(1.2)));
    }

    #[test]
    fn test_decode_partial_payload() {
        let record = decode(&encode(r#"{"costAmount":5,"currencyCode":null,"extra":[1]}"#)).unwrap();
        assert_eq!(record.cost_amount, Some(json!(5)));
        assert!(record.currency_code.is_none());
        assert!(record.budget_display_name.is_none());
    }

    #[test]
    fn test_missing_message() {
        let err = decode(&PushEnvelope::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Missing(MissingPart::Message)));
        assert!(err.is_missing());
    }

    #[test]
    fn test_missing_or_empty_data() {
        let mut envelope = PushEnvelope {
            message: Some(PubSubMessage::default()),
            subscription: None,
        };
        assert!(matches!(
            decode(&envelope),
            Err(DecodeError::Missing(MissingPart::Data))
        ));

        envelope = PushEnvelope::with_data("");
        assert!(matches!(
            decode(&envelope),
            Err(DecodeError::Missing(MissingPart::Data))
        ));
    }

    #[test]
    fn test_malformed_payloads_are_faults() {
        let bad_base64 = decode(&PushEnvelope::with_data("not base64!!")).unwrap_err();
        assert!(matches!(bad_base64, DecodeError::Base64(_)));

        let bad_utf8 = decode(&PushEnvelope::with_data(STANDARD.encode([0xff, 0xfe]))).unwrap_err();
        assert!(matches!(bad_utf8, DecodeError::Utf8(_)));

        let bad_json = decode(&encode("{not json")).unwrap_err();
        assert!(matches!(bad_json, DecodeError::Json(_)));

        let not_object = decode(&encode("[1, 2, 3]")).unwrap_err();
        assert!(matches!(not_object, DecodeError::Json(_)));
        assert!(!not_object.is_missing());
    }
}
