//! Redaction helpers for log output
//!
//! Tokens and email addresses are routed through these before they reach a
//! `tracing` macro.

/// Redacts an email address, keeping the first two characters of the local part
///
/// # Examples
///
/// ```
/// use storefront_session::redact;
///
/// assert_eq!(redact::email("john.doe@example.com"), "jo...@example.com");
/// assert_eq!(redact::email("a@b.com"), "***@b.com");
/// assert_eq!(redact::email("invalid"), "***");
/// ```
pub fn email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if local.chars().count() > 2 => {
            let prefix: String = local.chars().take(2).collect();
            format!("{}...@{}", prefix, domain)
        }
        Some((_, domain)) => format!("***@{}", domain),
        None => "***".to_string(),
    }
}

/// Redacts a bearer or refresh token, keeping only the last four characters
///
/// # Examples
///
/// ```
/// use storefront_session::redact;
///
/// assert_eq!(redact::token("eyJhbGciOiJIUzI1NiJ9.payload.sig4"), "***sig4");
/// assert_eq!(redact::token("abc"), "****");
/// ```
pub fn token(token: &str) -> String {
    let count = token.chars().count();
    if count > 4 {
        let tail: String = token.chars().skip(count - 4).collect();
        format!("***{}", tail)
    } else {
        "****".to_string()
    }
}

/// Strips query string and fragment from a request path
pub fn path(path: &str) -> &str {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    &path[..end]
}
