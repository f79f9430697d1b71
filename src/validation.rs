//! Client-side input validation
//!
//! Checks that run before any request leaves the process. The OTP scheme is
//! six digits everywhere: here, in the verify payload, and in any input
//! widget built on top of [`OTP_LENGTH`].

use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of digits in a verification code
pub const OTP_LENGTH: usize = 6;

/// Minimum password length accepted by login and signup
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum length for first and last names at signup
pub const MIN_NAME_LENGTH: usize = 2;

/// Errors produced by client-side validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters", min = MIN_PASSWORD_LENGTH)]
    PasswordTooShort,

    #[error("Password must contain at least one uppercase letter")]
    PasswordMissingUppercase,

    #[error("Password must contain at least one number")]
    PasswordMissingDigit,

    #[error("{0} must be at least {min} characters", min = MIN_NAME_LENGTH)]
    NameTooShort(&'static str),

    #[error("Verification code must be {expected} digits")]
    OtpLength { expected: usize, actual: usize },

    #[error("Verification code must contain only digits")]
    OtpNotNumeric,
}

/// A syntactically valid verification code
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct OtpCode(String);

impl OtpCode {
    /// Parses a code, requiring exactly [`OTP_LENGTH`] ASCII digits
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        let actual = code.chars().count();
        if actual != OTP_LENGTH {
            return Err(ValidationError::OtpLength {
                expected: OTP_LENGTH,
                actual,
            });
        }
        if !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::OtpNotNumeric);
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode([REDACTED])")
    }
}

/// Loose structural email check: one `@`, non-empty local part, dotted domain
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };

    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');

    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Login only enforces the minimum length
pub fn validate_login_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Signup additionally requires an uppercase letter and a digit
pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    validate_login_password(password)?;
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::PasswordMissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::PasswordMissingDigit);
    }
    Ok(())
}

pub fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::NameTooShort(field));
    }
    Ok(())
}
