//! Session types
//!
//! Token values are never logged; `Debug` implementations redact them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// Bearer token for the storefront admin API.
///
/// ```
/// use core_auth::SessionToken;
///
/// let token = SessionToken::new("eyJhbGciOi...").unwrap();
/// assert!(!token.is_expired());
/// assert_eq!(format!("{:?}", token).contains("eyJ"), false);
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    value: String,
    issued_at: DateTime<Utc>,
    /// `None` when the server did not announce an expiry
    expires_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    /// Create a token without a known expiry.
    ///
    /// Rejects empty values and values containing whitespace, which cannot be
    /// sent in an `Authorization` header.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(AuthError::InvalidToken("token is empty".to_string()));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(AuthError::InvalidToken(
                "token contains whitespace".to_string(),
            ));
        }

        Ok(Self {
            value,
            issued_at: Utc::now(),
            expires_at: None,
        })
    }

    /// Create a token that expires `expires_in_secs` from now.
    pub fn with_expiry(value: impl Into<String>, expires_in_secs: i64) -> Result<Self> {
        let mut token = Self::new(value)?;
        token.expires_at = Some(token.issued_at + Duration::seconds(expires_in_secs));
        Ok(token)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lifecycle of the operator's API session.
///
/// ```text
/// SignedOut --init/restore--> Active --401--> Expired
///     ^                         |               |
///     +----------clear----------+-------clear---+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    SignedOut,
    Active,
    /// The server rejected the token; a new login is required
    Expired,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::SignedOut => write!(f, "Signed out"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Expired => write!(f, "Expired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validation() {
        assert!(SessionToken::new("abc.def.ghi").is_ok());
        assert!(matches!(
            SessionToken::new(""),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            SessionToken::new("abc def"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_token_expiry() {
        let open_ended = SessionToken::new("t").unwrap();
        assert!(!open_ended.is_expired());
        assert!(open_ended.expires_at().is_none());

        let live = SessionToken::with_expiry("t", 3600).unwrap();
        assert!(!live.is_expired());

        let dead = SessionToken::with_expiry("t", -1).unwrap();
        assert!(dead.is_expired());
    }

    #[test]
    fn test_debug_redacts_value() {
        let token = SessionToken::new("super-secret").unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_session_state() {
        assert_eq!(SessionState::default(), SessionState::SignedOut);
        assert!(SessionState::Active.is_authenticated());
        assert!(!SessionState::Expired.is_authenticated());
        assert_eq!(SessionState::Expired.to_string(), "Expired");
    }
}
