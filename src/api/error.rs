use serde::Deserialize;
use thiserror::Error;

use crate::auth::StoreError;
use crate::http::TransportError;
use crate::validation::ValidationError;

/// The call an error came from; classification depends on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Signup,
    VerifyOtp,
    ResendOtp,
    ForgotPassword,
    Refresh,
    Profile,
    UpdateProfile,
}

/// Authentication failures surfaced to callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Verification code is invalid or expired")]
    OtpInvalidOrExpired,

    #[error("Email is already registered")]
    EmailAlreadyRegistered,

    #[error("Email address has not been verified")]
    EmailNotVerified,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Session terminated - please log in again")]
    SessionTerminated,

    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("Secure storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// Maximum length for server messages carried in errors
const MAX_MESSAGE_LENGTH: usize = 200;

/// Error bodies seen from the backend: `{error: {message}}`, `{message}`,
/// or `{data: {message}}`
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
    message: Option<String>,
    data: Option<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl AuthError {
    /// Extracts the server-supplied message from an error body, if any
    pub fn server_message(body: &[u8]) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
        parsed
            .error
            .and_then(|e| e.message)
            .or(parsed.message)
            .or_else(|| parsed.data.and_then(|d| d.message))
            .filter(|m| !m.trim().is_empty())
            .map(|m| Self::truncate(&m))
    }

    fn truncate(message: &str) -> String {
        if message.chars().count() <= MAX_MESSAGE_LENGTH {
            message.to_string()
        } else {
            let head: String = message.chars().take(MAX_MESSAGE_LENGTH).collect();
            format!("{}...", head)
        }
    }

    /// Maps a non-success response of `operation` onto the error taxonomy
    pub fn classify(operation: Operation, status: u16, message: Option<&str>) -> Self {
        let lowered = message.map(str::to_lowercase).unwrap_or_default();
        let detail = || {
            message
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status))
        };

        match status {
            401 => AuthError::InvalidCredentials,
            403 if lowered.contains("verify") => AuthError::EmailNotVerified,
            403 if operation == Operation::Login => AuthError::InvalidCredentials,
            400 | 410 if operation == Operation::VerifyOtp || lowered.contains("otp") => {
                AuthError::OtpInvalidOrExpired
            }
            409 if operation == Operation::Signup => AuthError::EmailAlreadyRegistered,
            400 | 409 if lowered.contains("already") => AuthError::EmailAlreadyRegistered,
            400 if operation == Operation::Login => AuthError::InvalidCredentials,
            429 => AuthError::RateLimited,
            500..=599 => AuthError::ServerUnavailable(detail()),
            _ => AuthError::Unknown(detail()),
        }
    }

    /// Short text suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password. Please try again.".into(),
            AuthError::OtpInvalidOrExpired => {
                "The verification code is incorrect or has expired. Please try again.".into()
            }
            AuthError::EmailAlreadyRegistered => {
                "This email is already registered. Please log in instead.".into()
            }
            AuthError::EmailNotVerified => "Please verify your email before logging in.".into(),
            AuthError::RateLimited => {
                "Too many attempts. Please wait a moment before trying again.".into()
            }
            AuthError::SessionTerminated => "Your session has expired. Please log in again.".into(),
            AuthError::NetworkUnreachable(_) => {
                "Unable to connect. Please check your internet connection.".into()
            }
            AuthError::ServerUnavailable(_) => {
                "We're experiencing technical difficulties. Please try again later.".into()
            }
            AuthError::StorageUnavailable(_) => {
                "Could not access secure storage on this device. Please try again.".into()
            }
            AuthError::InvalidInput(e) => e.to_string(),
            AuthError::Unknown(_) => "Something went wrong. Please try again.".into(),
        }
    }

    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::RateLimited
                | AuthError::NetworkUnreachable(_)
                | AuthError::ServerUnavailable(_)
        )
    }
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => AuthError::ServerUnavailable("request timed out".into()),
            TransportError::Connect(msg) => AuthError::NetworkUnreachable(msg),
            TransportError::Request(msg) => AuthError::Unknown(msg),
            TransportError::SessionTerminated => AuthError::SessionTerminated,
            TransportError::Storage(msg) => AuthError::StorageUnavailable(msg),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::StorageUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_login() {
        assert_eq!(
            AuthError::classify(Operation::Login, 401, None),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::classify(Operation::Login, 400, Some("Invalid credentials")),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::classify(Operation::Login, 403, Some("Please verify your email")),
            AuthError::EmailNotVerified
        );
    }

    #[test]
    fn test_classify_otp() {
        assert_eq!(
            AuthError::classify(Operation::VerifyOtp, 400, Some("Invalid code")),
            AuthError::OtpInvalidOrExpired
        );
        assert_eq!(
            AuthError::classify(Operation::ResendOtp, 400, Some("OTP expired")),
            AuthError::OtpInvalidOrExpired
        );
    }

    #[test]
    fn test_classify_signup_conflict() {
        assert_eq!(
            AuthError::classify(Operation::Signup, 409, None),
            AuthError::EmailAlreadyRegistered
        );
        assert_eq!(
            AuthError::classify(Operation::Signup, 400, Some("User with this email already exists")),
            AuthError::EmailAlreadyRegistered
        );
    }

    #[test]
    fn test_classify_generic_statuses() {
        assert_eq!(
            AuthError::classify(Operation::Profile, 429, None),
            AuthError::RateLimited
        );
        assert_eq!(
            AuthError::classify(Operation::Refresh, 503, None),
            AuthError::ServerUnavailable("HTTP 503".into())
        );
        assert_eq!(
            AuthError::classify(Operation::Signup, 422, Some("firstName is required")),
            AuthError::Unknown("firstName is required".into())
        );
    }

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(
            AuthError::server_message(br#"{"success":false,"error":{"message":"Bad OTP"}}"#),
            Some("Bad OTP".into())
        );
        assert_eq!(
            AuthError::server_message(br#"{"message":"Nope"}"#),
            Some("Nope".into())
        );
        assert_eq!(
            AuthError::server_message(br#"{"data":{"message":"Inner"}}"#),
            Some("Inner".into())
        );
        assert_eq!(AuthError::server_message(b"<html>"), None);
        assert_eq!(AuthError::server_message(br#"{"message":"  "}"#), None);
    }

    #[test]
    fn test_server_message_truncated() {
        let long = "x".repeat(500);
        let body = serde_json::json!({ "message": long }).to_string();
        let message = AuthError::server_message(body.as_bytes()).unwrap();
        assert_eq!(message.len(), MAX_MESSAGE_LENGTH + 3);
    }

    #[test]
    fn test_transport_error_mapping() {
        assert_eq!(
            AuthError::from(TransportError::Connect("refused".into())),
            AuthError::NetworkUnreachable("refused".into())
        );
        assert!(matches!(
            AuthError::from(TransportError::Timeout),
            AuthError::ServerUnavailable(_)
        ));
        assert_eq!(
            AuthError::from(TransportError::SessionTerminated),
            AuthError::SessionTerminated
        );
    }

    #[test]
    fn test_user_messages_keep_remediation_distinct() {
        let credentials = AuthError::InvalidCredentials.user_message();
        let server = AuthError::ServerUnavailable("x".into()).user_message();
        let network = AuthError::NetworkUnreachable("x".into()).user_message();

        assert_ne!(credentials, server);
        assert_ne!(server, network);
        assert!(network.contains("connection"));
    }

    #[test]
    fn test_is_transient() {
        assert!(AuthError::RateLimited.is_transient());
        assert!(!AuthError::InvalidCredentials.is_transient());
        assert!(!AuthError::SessionTerminated.is_transient());
    }
}
