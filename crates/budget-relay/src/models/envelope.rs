//! Push subscription envelope types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outer structure delivered by the messaging platform on each push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    /// The published message
    #[serde(default)]
    pub message: Option<PubSubMessage>,

    /// Subscription that delivered the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

/// A single published message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    /// Base64-encoded payload
    #[serde(default)]
    pub data: Option<String>,

    /// Publisher-supplied attributes (e.g. `budgetId`, `billingAccountId`)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,

    /// Platform-assigned message ID
    #[serde(default, alias = "message_id", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Publish time as reported by the platform
    #[serde(default, alias = "publish_time", skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
}

impl PushEnvelope {
    /// Parse an envelope from a raw request body.
    ///
    /// An empty body or a JSON `null` is an envelope without a message.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let envelope: Option<Self> = serde_json::from_slice(body)?;
        Ok(envelope.unwrap_or_default())
    }

    /// Build an envelope around an already-encoded data string
    pub fn with_data(data: impl Into<String>) -> Self {
        Self {
            message: Some(PubSubMessage {
                data: Some(data.into()),
                ..PubSubMessage::default()
            }),
            subscription: None,
        }
    }

    /// Message ID, when present
    pub fn message_id(&self) -> Option<&str> {
        self.message.as_ref()?.message_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_null_bodies() {
        assert_eq!(PushEnvelope::from_slice(b"").unwrap(), PushEnvelope::default());
        assert_eq!(PushEnvelope::from_slice(b" \n").unwrap(), PushEnvelope::default());
        assert_eq!(PushEnvelope::from_slice(b"null").unwrap(), PushEnvelope::default());
    }

    #[test]
    fn test_push_body() {
        let body = br#"{
            "message": {
                "data": "e30=",
                "attributes": {"budgetId": "b-1"},
                "messageId": "42",
                "publishTime": "2024-01-01T12:00:00Z"
            },
            "subscription": "projects/p/subscriptions/s"
        }"#;

        let envelope = PushEnvelope::from_slice(body).unwrap();
        let message = envelope.message.as_ref().unwrap();
        assert_eq!(message.data.as_deref(), Some("e30="));
        assert_eq!(message.attributes["budgetId"], "b-1");
        assert_eq!(envelope.message_id(), Some("42"));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(PushEnvelope::from_slice(b"{not json").is_err());
    }
}
