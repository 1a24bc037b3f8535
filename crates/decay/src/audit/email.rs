//! Email address validation used for owners, administrators and senders.
//!
//! Deliberately syntactic: no DNS lookups. The domain is lowercased, the local
//! part is kept as written.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

static LOCAL_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*$")
        .expect("local part pattern is valid")
});

static DOMAIN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("label pattern is valid")
});

const MAX_LOCAL_LEN: usize = 64;
const MAX_ADDRESS_LEN: usize = 254;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidEmail {
    #[error("the address is empty")]
    Empty,
    #[error("the address must contain exactly one @-sign")]
    AtSign,
    #[error("the part before the @-sign is not valid")]
    LocalPart,
    #[error("the domain name '{0}' is not valid")]
    Domain(String),
    #[error("the address is too long")]
    TooLong,
}

/// A syntactically valid, normalized email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, InvalidEmail> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidEmail::Empty);
        }
        if trimmed.len() > MAX_ADDRESS_LEN {
            return Err(InvalidEmail::TooLong);
        }

        let mut parts = trimmed.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => return Err(InvalidEmail::AtSign),
        };

        if local.is_empty() || local.len() > MAX_LOCAL_LEN || !LOCAL_PART.is_match(local) {
            return Err(InvalidEmail::LocalPart);
        }

        let domain = domain.to_ascii_lowercase();
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || !labels.iter().all(|label| DOMAIN_LABEL.is_match(label)) {
            return Err(InvalidEmail::Domain(domain));
        }
        let tld = labels[labels.len() - 1];
        if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(InvalidEmail::Domain(domain));
        }

        Ok(Self(format!("{}@{}", local, domain)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = InvalidEmail;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = InvalidEmail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
