//! Caller identity.
//!
//! Authentication happens upstream; the services only ever see an explicit
//! [`Caller`] value handed to them by the request layer or by a test.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An email-shaped account identifier that owns orders and payments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountEmail(String);

/// Returned when an account identifier is not email-shaped.
#[derive(Debug, Clone, Error)]
#[error("invalid account email '{0}'")]
pub struct InvalidAccountEmail(pub String);

impl AccountEmail {
    /// Parses an account email, rejecting blank or non-email-shaped input.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidAccountEmail> {
        let value = value.into();
        let trimmed = value.trim();
        let valid = match trimmed.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !trimmed.chars().any(char::is_whitespace)
            }
            None => false,
        };

        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidAccountEmail(value))
        }
    }

    /// Returns the email as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountEmail {
    type Error = InvalidAccountEmail;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AccountEmail> for String {
    fn from(email: AccountEmail) -> Self {
        email.0
    }
}

/// The identity a manager operation is invoked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No authenticated principal.
    Anonymous,

    /// An authenticated end-user account.
    Account(AccountEmail),
}

impl Caller {
    /// Creates an authenticated caller.
    pub fn account(email: AccountEmail) -> Self {
        Caller::Account(email)
    }

    /// Returns the authenticated account, if any.
    pub fn authenticated(&self) -> Option<&AccountEmail> {
        match self {
            Caller::Account(email) => Some(email),
            Caller::Anonymous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_email_shaped_accounts() {
        let email = AccountEmail::parse(" buyer@example.com ").unwrap();
        assert_eq!(email.as_str(), "buyer@example.com");
    }

    #[test]
    fn rejects_non_email_accounts() {
        for bad in ["", "buyer", "@example.com", "buyer@", "a@b@c", "bu yer@example.com"] {
            assert!(AccountEmail::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn deserialization_validates() {
        let ok: AccountEmail = serde_json::from_str("\"a@b.io\"").unwrap();
        assert_eq!(ok.as_str(), "a@b.io");
        assert!(serde_json::from_str::<AccountEmail>("\"nope\"").is_err());
    }

    #[test]
    fn anonymous_caller_is_not_authenticated() {
        assert!(Caller::Anonymous.authenticated().is_none());
        let caller = Caller::account(AccountEmail::parse("a@b.io").unwrap());
        assert_eq!(caller.authenticated().unwrap().as_str(), "a@b.io");
    }
}
