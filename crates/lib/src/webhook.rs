//! Webhook relay: turns a completed-order event into a survey message to the customer.

use crate::config::SurveyConfig;
use crate::error::{RelayError, SendError};
use crate::session::MessageSender;
use serde::Deserialize;
use std::sync::Arc;

/// Order-status event posted by the store platform. Only the fields the relay reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Status is sent as either a number or a label depending on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderStatus {
    Code(i64),
    Label(String),
}

impl OrderStatus {
    fn marker(&self) -> String {
        match self {
            OrderStatus::Code(code) => code.to_string(),
            OrderStatus::Label(label) => label.trim().to_string(),
        }
    }
}

/// What the relay did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent { address: String },
    /// Not a completed order, no phone, or an unreadable payload.
    Ignored,
    /// Completed order, but the session could not send. The message is dropped.
    NotReady,
}

/// Strip a leading `+` and all whitespace.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Transport address for a normalized phone number.
pub fn transport_address(phone: &str, domain: &str) -> String {
    format!("{}@{}", phone, domain)
}

pub struct WebhookRelay {
    sender: Arc<dyn MessageSender>,
    completed_statuses: Vec<String>,
    message_template: String,
    address_domain: String,
}

impl WebhookRelay {
    pub fn new(sender: Arc<dyn MessageSender>, survey: &SurveyConfig, address_domain: &str) -> Self {
        Self {
            sender,
            completed_statuses: survey
                .completed_statuses
                .iter()
                .map(|s| s.trim().to_string())
                .collect(),
            message_template: survey.message.clone(),
            address_domain: address_domain.to_string(),
        }
    }

    fn is_completed(&self, status: Option<&OrderStatus>) -> bool {
        let Some(status) = status else { return false };
        let marker = status.marker();
        self.completed_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&marker))
    }

    /// Survey text personalized with the customer's name.
    pub fn survey_message(&self, name: Option<&str>) -> String {
        let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("there");
        self.message_template.replace("{name}", name)
    }

    /// Validate the event and, for a completed order with a phone, send one survey.
    pub async fn relay(&self, event: &WebhookEvent) -> Result<RelayOutcome, RelayError> {
        if !self.is_completed(event.status.as_ref()) {
            return Ok(RelayOutcome::Ignored);
        }
        let customer = event.customer.as_ref();
        let Some(phone) = customer
            .and_then(|c| c.phone.as_deref())
            .map(normalize_phone)
            .filter(|p| !p.is_empty())
        else {
            return Ok(RelayOutcome::Ignored);
        };
        let address = transport_address(&phone, &self.address_domain);
        let text = self.survey_message(customer.and_then(|c| c.name.as_deref()));
        match self.sender.send(&address, &text).await {
            Ok(()) => Ok(RelayOutcome::Sent { address }),
            Err(SendError::NotReady) => Ok(RelayOutcome::NotReady),
            Err(SendError::Transport(e)) => Err(RelayError::Transport(e)),
        }
    }

    /// Relay a raw request body. A body that does not parse is ignored like a non-completion.
    pub async fn relay_json(&self, body: &[u8]) -> Result<RelayOutcome, RelayError> {
        match serde_json::from_slice::<WebhookEvent>(body) {
            Ok(event) => self.relay(&event).await,
            Err(e) => {
                log::debug!("webhook: unreadable payload ignored: {}", e);
                Ok(RelayOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, address: &str, text: &str) -> Result<(), SendError> {
            self.sent
                .lock()
                .unwrap()
                .push((address.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct FailingSender(fn() -> SendError);

    #[async_trait]
    impl MessageSender for FailingSender {
        async fn send(&self, _: &str, _: &str) -> Result<(), SendError> {
            Err((self.0)())
        }
    }

    fn relay_with(sender: Arc<dyn MessageSender>) -> WebhookRelay {
        WebhookRelay::new(sender, &SurveyConfig::default(), "s.whatsapp.net")
    }

    #[test]
    fn phone_is_normalized() {
        assert_eq!(normalize_phone("+1 555 0100"), "15550100");
        assert_eq!(normalize_phone(" +55 11\t9999 0000 "), "551199990000");
        assert_eq!(normalize_phone("5511999990000"), "5511999990000");
        assert_eq!(normalize_phone("+"), "");
    }

    #[tokio::test]
    async fn completed_order_sends_personalized_survey() {
        let sender = Arc::new(RecordingSender::default());
        let relay = relay_with(sender.clone());
        let outcome = relay
            .relay_json(br#"{"customer":{"phone":"+1 555 0100","name":"Ana"},"status":"completed"}"#)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Sent {
                address: "15550100@s.whatsapp.net".to_string()
            }
        );
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "15550100@s.whatsapp.net");
        assert!(sent[0].1.contains("Ana"));
        assert!(sent[0].1.contains("1 - "));
        assert!(sent[0].1.contains("2 - "));
    }

    #[tokio::test]
    async fn pending_order_is_ignored() {
        let sender = Arc::new(RecordingSender::default());
        let relay = relay_with(sender.clone());
        let outcome = relay
            .relay_json(br#"{"customer":{"phone":"+1 555 0100"},"status":"pending"}"#)
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Ignored);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_phone_or_customer_is_ignored() {
        let sender = Arc::new(RecordingSender::default());
        let relay = relay_with(sender.clone());
        for body in [
            &br#"{"customer":{},"status":"completed"}"#[..],
            br#"{"status":"completed"}"#,
            br#"{"customer":{"phone":"  "},"status":"completed"}"#,
            br#"not json"#,
            br#"{"customer":{"phone":12345},"status":"completed"}"#,
        ] {
            assert_eq!(relay.relay_json(body).await.unwrap(), RelayOutcome::Ignored);
        }
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn numeric_status_matches_configured_code() {
        let sender = Arc::new(RecordingSender::default());
        let survey = SurveyConfig {
            completed_statuses: vec!["4".to_string(), "Completed".to_string()],
            ..SurveyConfig::default()
        };
        let relay = WebhookRelay::new(sender.clone(), &survey, "s.whatsapp.net");
        for body in [
            &br#"{"customer":{"phone":"15550100"},"status":4}"#[..],
            br#"{"customer":{"phone":"15550100"},"status":"completed"}"#,
        ] {
            assert!(matches!(
                relay.relay_json(body).await.unwrap(),
                RelayOutcome::Sent { .. }
            ));
        }
        assert_eq!(
            relay
                .relay_json(br#"{"customer":{"phone":"15550100"},"status":3}"#)
                .await
                .unwrap(),
            RelayOutcome::Ignored
        );
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repeated_events_each_send() {
        let sender = Arc::new(RecordingSender::default());
        let relay = relay_with(sender.clone());
        let body = br#"{"customer":{"phone":"+1 555 0100","name":"Ana"},"status":"completed"}"#;
        relay.relay_json(body).await.unwrap();
        relay.relay_json(body).await.unwrap();
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn not_ready_is_an_outcome_not_an_error() {
        let relay = relay_with(Arc::new(FailingSender(|| SendError::NotReady)));
        let outcome = relay
            .relay_json(br#"{"customer":{"phone":"+1 555 0100"},"status":"completed"}"#)
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::NotReady);
    }

    #[tokio::test]
    async fn transport_failure_is_an_error_with_its_text() {
        let relay = relay_with(Arc::new(FailingSender(|| {
            SendError::Transport(TransportError::Rejected("number not on network".to_string()))
        })));
        let err = relay
            .relay_json(br#"{"customer":{"phone":"+1 555 0100"},"status":"completed"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "transport rejected request: number not on network");
    }

    #[test]
    fn survey_without_name_uses_greeting_fallback() {
        let relay = relay_with(Arc::new(RecordingSender::default()));
        let text = relay.survey_message(None);
        assert!(text.starts_with("Hi there!"));
        assert!(!text.contains("{name}"));
    }
}
