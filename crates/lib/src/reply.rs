//! Reply classifier: answers a customer's numeric survey reply.
//!
//! Each inbound message is classified on its own against a fixed two-option menu. No state is
//! kept between messages.

use crate::config::SurveyConfig;
use crate::error::SendError;
use crate::session::MessageSender;
use crate::transport::InboundEvent;
use std::sync::Arc;

/// Menu option the customer picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyAnswer {
    /// "1": happy customer, gets the review link.
    Positive,
    /// "2": unhappy customer, gets an apology.
    Negative,
}

/// Exact match on the trimmed body. Anything else is not an answer.
pub fn classify(body: &str) -> Option<SurveyAnswer> {
    match body.trim() {
        "1" => Some(SurveyAnswer::Positive),
        "2" => Some(SurveyAnswer::Negative),
        _ => None,
    }
}

pub struct ReplyClassifier {
    sender: Arc<dyn MessageSender>,
    positive_reply: String,
    negative_reply: String,
}

impl ReplyClassifier {
    pub fn new(sender: Arc<dyn MessageSender>, survey: &SurveyConfig) -> Self {
        Self {
            sender,
            positive_reply: survey
                .positive_reply
                .replace("{reviewLink}", &survey.review_link),
            negative_reply: survey.negative_reply.clone(),
        }
    }

    /// Handle one inbound message. Returns the answer that was replied to, or None when the
    /// message was ignored (own echo or not a menu option).
    pub async fn handle(&self, event: &InboundEvent) -> Result<Option<SurveyAnswer>, SendError> {
        if event.is_self_originated {
            return Ok(None);
        }
        let Some(answer) = classify(&event.body_text) else {
            return Ok(None);
        };
        let text = match answer {
            SurveyAnswer::Positive => &self.positive_reply,
            SurveyAnswer::Negative => &self.negative_reply,
        };
        self.sender.send(&event.sender_address, text).await?;
        Ok(Some(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn survey() -> SurveyConfig {
        SurveyConfig {
            positive_reply: "thanks! review us at {reviewLink}".to_string(),
            negative_reply: "sorry, we will call you".to_string(),
            review_link: "https://example.test/review".to_string(),
            ..SurveyConfig::default()
        }
    }

    fn inbound(body: &str, own: bool) -> InboundEvent {
        InboundEvent {
            sender_address: "15550100@s.whatsapp.net".to_string(),
            is_self_originated: own,
            body_text: body.to_string(),
        }
    }

    fn classifier() -> (ReplyClassifier, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        (ReplyClassifier::new(sender.clone(), &survey()), sender)
    }

    #[test]
    fn classify_matches_exact_trimmed_options() {
        assert_eq!(classify("1"), Some(SurveyAnswer::Positive));
        assert_eq!(classify(" 1 "), Some(SurveyAnswer::Positive));
        assert_eq!(classify("2\n"), Some(SurveyAnswer::Negative));
        assert_eq!(classify("3"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("12"), None);
        assert_eq!(classify("1."), None);
        assert_eq!(classify("one"), None);
    }

    #[tokio::test]
    async fn option_one_sends_review_link() {
        let (c, sender) = classifier();
        let answer = c.handle(&inbound(" 1 ", false)).await.unwrap();
        assert_eq!(answer, Some(SurveyAnswer::Positive));
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![(
                "15550100@s.whatsapp.net".to_string(),
                "thanks! review us at https://example.test/review".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn option_two_sends_apology() {
        let (c, sender) = classifier();
        assert_eq!(
            c.handle(&inbound("2", false)).await.unwrap(),
            Some(SurveyAnswer::Negative)
        );
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "sorry, we will call you");
    }

    #[tokio::test]
    async fn other_bodies_send_nothing() {
        let (c, sender) = classifier();
        for body in ["3", "", "hello"] {
            assert_eq!(c.handle(&inbound(body, false)).await.unwrap(), None);
        }
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn own_messages_are_never_answered() {
        let (c, sender) = classifier();
        for body in ["1", "2"] {
            assert_eq!(c.handle(&inbound(body, true)).await.unwrap(), None);
        }
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn not_ready_is_returned_to_caller() {
        struct Offline;

        #[async_trait]
        impl MessageSender for Offline {
            async fn send(&self, _: &str, _: &str) -> Result<(), SendError> {
                Err(SendError::NotReady)
            }
        }

        let c = ReplyClassifier::new(Arc::new(Offline), &survey());
        assert!(matches!(
            c.handle(&inbound("1", false)).await,
            Err(SendError::NotReady)
        ));
    }
}
