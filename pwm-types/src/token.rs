//! Opaque user token for the sync server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The opaque user token that scopes a preset set on the sync server.
///
/// Serialized as a bare JSON string. `Debug` never prints the value.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw token (for sending it, never for logging it).
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "Token(<empty>)")
        } else {
            write!(f, "Token([REDACTED])")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_value() {
        let token = Token::new("s3cr3t-user-token");
        let debug = format!("{:?}", token);
        assert_eq!(debug, "Token([REDACTED])");
        assert!(!debug.contains("s3cr3t"));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Token::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "abc");
    }
}
