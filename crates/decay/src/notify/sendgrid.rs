//! Email delivery through the SendGrid v3 mail API.

use crate::audit::EmailAddress;
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A report could not be delivered. Other reports are still attempted.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("failed to send email to {recipients}: {message}")]
    Transport { recipients: String, message: String },

    #[error("failed to send email to {recipients}: {status} - {body}")]
    Rejected {
        recipients: String,
        status: u16,
        body: String,
    },
}

impl DeliveryError {
    pub fn recipients(&self) -> &str {
        match self {
            Self::Transport { recipients, .. } | Self::Rejected { recipients, .. } => recipients,
        }
    }
}

/// One multipart (plain text + HTML) email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub plain_text: String,
    pub html: String,
}

impl EmailMessage {
    /// Comma separated recipient list for logs and errors.
    pub fn recipient_list(&self) -> String {
        self.to
            .iter()
            .map(EmailAddress::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Sends one message. Implemented by SendGrid in production and by a
/// recording mailer in tests.
pub trait Mailer {
    fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct MailSend<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    mime: &'a str,
    value: &'a str,
}

impl<'a> MailSend<'a> {
    fn from_message(message: &'a EmailMessage) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: message
                    .to
                    .iter()
                    .map(|email| Address {
                        email: email.as_str(),
                    })
                    .collect(),
            }],
            from: Address {
                email: message.from.as_str(),
            },
            subject: &message.subject,
            // SendGrid requires text/plain before text/html.
            content: vec![
                Content {
                    mime: "text/plain",
                    value: &message.plain_text,
                },
                Content {
                    mime: "text/html",
                    value: &message.html,
                },
            ],
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct SendGridMailer {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl SendGridMailer {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DeliveryError> {
        Self::with_endpoint(api_key, SENDGRID_ENDPOINT)
    }

    pub fn with_endpoint(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("decay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Transport {
                recipients: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        })
    }
}

impl Mailer for SendGridMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let recipients = message.recipient_list();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&MailSend::from_message(message))
            .send()
            .map_err(|e| DeliveryError::Transport {
                recipients: recipients.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(DeliveryError::Rejected {
            recipients,
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }
}
