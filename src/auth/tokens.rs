//! Access/refresh token pair
//!
//! The unit that is written to, read from, and cleared from the credential
//! store. A pair is never partially populated.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors raised when building a token pair
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenPairError {
    /// Access token was empty
    #[error("Access token cannot be empty")]
    EmptyAccessToken,

    /// Refresh token was empty
    #[error("Refresh token cannot be empty")]
    EmptyRefreshToken,
}

/// An access token together with the refresh token issued alongside it
///
/// Both secrets are wiped from memory when the pair is dropped and never
/// appear in `Debug` output.
#[derive(Clone, Serialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
}

impl TokenPair {
    /// Creates a pair, rejecting empty tokens
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, TokenPairError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();

        if access_token.trim().is_empty() {
            return Err(TokenPairError::EmptyAccessToken);
        }
        if refresh_token.trim().is_empty() {
            return Err(TokenPairError::EmptyRefreshToken);
        }

        Ok(Self {
            access_token,
            refresh_token,
        })
    }

    /// The bearer credential attached to authenticated requests
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The credential exchanged for a new pair
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenPair {
    access_token: String,
    refresh_token: String,
}

// Deserialization goes through `new` so a stored or received pair with an
// empty half is rejected instead of silently accepted.
impl<'de> Deserialize<'de> for TokenPair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawTokenPair::deserialize(deserializer)?;
        TokenPair::new(raw.access_token, raw.refresh_token).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_halves() {
        assert_eq!(
            TokenPair::new("", "refresh").unwrap_err(),
            TokenPairError::EmptyAccessToken
        );
        assert_eq!(
            TokenPair::new("access", "  ").unwrap_err(),
            TokenPairError::EmptyRefreshToken
        );
    }

    #[test]
    fn test_persisted_layout() {
        let pair = TokenPair::new("acc-1", "ref-1").unwrap();
        let json = serde_json::to_value(&pair).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"accessToken": "acc-1", "refreshToken": "ref-1"})
        );
    }

    #[test]
    fn test_deserialize_rejects_partial_pair() {
        let result = serde_json::from_str::<TokenPair>(r#"{"accessToken":"a","refreshToken":""}"#);
        assert!(result.is_err());

        let result = serde_json::from_str::<TokenPair>(r#"{"accessToken":"a"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let pair = TokenPair::new("very-secret-access", "very-secret-refresh").unwrap();
        let debug = format!("{:?}", pair);

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret"));
    }
}
