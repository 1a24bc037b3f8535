//! Mailer that keeps messages in memory.

use decay::notify::{DeliveryError, EmailMessage, Mailer};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    rejected: HashSet<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer messages to `recipient` with HTTP 400.
    pub fn reject(mut self, recipient: &str) -> Self {
        self.rejected.insert(recipient.to_string());
        self
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Messages whose recipient list contains `recipient`.
    pub fn sent_to(&self, recipient: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.to.iter().any(|to| to.as_str() == recipient))
            .collect()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let recipients = message.recipient_list();
        if message.to.iter().any(|to| self.rejected.contains(to.as_str())) {
            return Err(DeliveryError::Rejected {
                recipients,
                status: 400,
                body: "rejected by test mailer".to_string(),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}
