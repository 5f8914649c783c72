//! Most of the structs in `web` module and their implementations live here.
//! Includes structs that need to be validated, their parsing implementations and tests for those

use lazy_regex::regex_is_match;
use serde::Serialize;

// ###################################
// ->   STRUCTS
// ###################################
/// Validated and normalized subscriber email.
/// Trimmed and lower-cased, so it can be used as the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidEmail(String);

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ValidEmail {
    /// Normalizes the input and checks it has the `local@domain.tld` shape.
    /// No part may contain whitespace or another `@`.
    pub fn parse<S>(value: S) -> Result<Self, DataParsingError>
    where
        S: AsRef<str>,
    {
        let value = normalize_email(value.as_ref());

        if value.is_empty() {
            return Err(DataParsingError::EmailEmpty);
        }

        if regex_is_match!(r"^[^\s@]+@[^\s@]+\.[^\s@]+$", &value) {
            Ok(ValidEmail(value))
        } else {
            Err(DataParsingError::EmailInvalid)
        }
    }
}

/// Trims surrounding whitespace and lower-cases.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// A subscriber that passed validation and is ready to be stored.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub email: ValidEmail,
    pub source: String,
    /// Lowercase hex SHA-256 of the client ip, never the ip itself.
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
}

impl NewSubscriber {
    pub fn new(
        email: ValidEmail,
        source: String,
        ip_hash: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            email,
            source,
            ip_hash,
            user_agent,
        }
    }
}

/// JSON body returned to programmatic clients of `/api/subscribe`.
#[derive(Debug, Serialize)]
pub struct SubscribeAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl SubscribeAck {
    pub const INVALID_EMAIL: &'static str = "invalid_email";

    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn invalid_email() -> Self {
        Self {
            ok: false,
            error: Some(Self::INVALID_EMAIL),
        }
    }
}

// ###################################
// ->   ERROR
// ###################################
#[derive(Debug, thiserror::Error)]
pub enum DataParsingError {
    #[error("missing email")]
    EmailEmpty,
    #[error("email invalid")]
    EmailInvalid,
}
