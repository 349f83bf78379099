//! Webhook delivery for budget alerts

use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::NotifierConfig;
use crate::models::{render_field, AlertRecord};

/// Posts formatted budget alerts to a chat webhook.
///
/// Exactly one request per [`send`](Self::send); only `200 OK` counts as delivered.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: Url,
    title: String,
}

impl WebhookNotifier {
    /// Create a notifier from configuration
    pub fn new(config: &NotifierConfig) -> Result<Self, NotificationError> {
        let webhook_url = Url::parse(&config.webhook_url)
            .map_err(|e| NotificationError::ConfigError(format!("invalid webhook URL: {e}")))?;

        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NotificationError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            webhook_url,
            title: config.title.clone(),
        })
    }

    /// Webhook endpoint this notifier posts to
    pub fn webhook_url(&self) -> &Url {
        &self.webhook_url
    }

    /// Render an alert as a chat message
    pub fn format_message(&self, record: &AlertRecord) -> String {
        let currency = render_field(record.currency_code.as_ref());

        format!(
            "*{}*\nBudget: {}\nCost: {} {}\nBudget Amount: {} {}\nThreshold: {}",
            self.title,
            render_field(record.budget_display_name.as_ref()),
            render_field(record.cost_amount.as_ref()),
            currency,
            render_field(record.budget_amount.as_ref()),
            currency,
            render_field(record.alert_threshold_exceeded.as_ref()),
        )
    }

    /// Deliver a message to the webhook
    pub async fn send(&self, message: &str) -> Result<(), NotificationError> {
        debug!(url = %self.webhook_url, "Posting alert to webhook");

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&WebhookPayload { text: message })
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        let status = response.status();
        info!(status = status.as_u16(), "Webhook responded");

        if status != StatusCode::OK {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        status = status.as_u16(),
                        error = %e,
                        "Failed to read webhook response body"
                    );
                    String::new()
                }
            };
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Transport failure before a response arrived
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Webhook answered with anything other than `200 OK`
    #[error("Webhook returned {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, empty if unreadable
        body: String,
    },

    /// Notifier could not be built
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(url: &str) -> WebhookNotifier {
        WebhookNotifier::new(&NotifierConfig {
            webhook_url: url.to_string(),
            ..NotifierConfig::default()
        })
        .unwrap()
    }

    fn eng_record() -> AlertRecord {
        serde_json::from_value(json!({
            "budgetDisplayName": "Eng",
            "costAmount": 120,
            "currencyCode": "USD",
            "budgetAmount": 100,
            "alertThresholdExceeded": 1.2
        }))
        .unwrap()
    }

    #[test]
    fn test_format_message() {
        let message = notifier("http://localhost/hook").format_message(&eng_record());

        assert_eq!(
            message,
            "*Budget Alert*\nBudget: Eng\nCost: 120 USD\nBudget Amount: 100 USD\nThreshold: 1.2"
        );
    }

    #[test]
    fn test_format_message_with_missing_fields() {
        let message = notifier("http://localhost/hook").format_message(&AlertRecord::default());

        assert_eq!(
            message,
            "*Budget Alert*\nBudget: \nCost:  \nBudget Amount:  \nThreshold: "
        );
    }

    #[test]
    fn test_custom_title() {
        let notifier = WebhookNotifier::new(&NotifierConfig {
            webhook_url: "http://localhost/hook".to_string(),
            title: "GCP Budget Alert".to_string(),
            ..NotifierConfig::default()
        })
        .unwrap();

        assert!(notifier
            .format_message(&eng_record())
            .starts_with("*GCP Budget Alert*\n"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = WebhookNotifier::new(&NotifierConfig {
            webhook_url: "not a url".to_string(),
            ..NotifierConfig::default()
        })
        .unwrap_err();

        assert!(matches!(err, NotificationError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_send_posts_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&format!("{}/hook", server.uri()))
            .send("hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_200_success_codes_are_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = notifier(&server.uri()).send("hello").await.unwrap_err();
        assert!(matches!(err, NotificationError::Rejected { status: 204, .. }));
    }

    #[tokio::test]
    async fn test_error_carries_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid_token"))
            .mount(&server)
            .await;

        let err = notifier(&server.uri()).send("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "Webhook returned 403: invalid_token");
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on port 1
        let err = notifier("http://127.0.0.1:1/hook")
            .send("hello")
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::HttpError(_)));
    }
}
