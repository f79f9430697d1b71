//! Client for the storefront authentication API
//!
//! Each method is a single request/response mapping with no local state:
//! build the payload, send it through the configured [`Transport`], and
//! translate the result into a value or an [`AuthError`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{AuthError, Operation};
use crate::auth::TokenPair;
use crate::http::{ApiRequest, ApiResponse, FormField, Transport};
use crate::redact;
use crate::validation::OtpCode;

/// Paths of the authentication endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub signup: String,
    pub verify_otp: String,
    pub resend_otp: String,
    pub forgot_password: String,
    pub refresh: String,
    pub profile: String,
}

impl Endpoints {
    /// Endpoints under a path prefix such as `/api`; empty for none
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let at = |path: &str| format!("{}{}", prefix, path);
        Self {
            login: at("/auth/login"),
            signup: at("/auth/signup"),
            verify_otp: at("/auth/verify-otp"),
            resend_otp: at("/auth/resend-verification-otp"),
            forgot_password: at("/auth/forgot-password"),
            refresh: at("/auth/refresh-token"),
            profile: at("/user/profile"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_prefix("")
    }
}

/// The signed-in user as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image_url: Option<String>,
    pub is_email_verified: bool,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Image attached to a signup or profile update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Registration form
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub profile_image: Option<ProfileImage>,
}

/// Changes to the signed-in user's profile
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<ProfileImage>,
}

/// Exchanges a refresh token for a new token pair
///
/// The seam the session-aware transport depends on.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
}

// ============================================================================
// Wire types
// ============================================================================

/// Payloads arrive either bare or wrapped as `{success, data: ...}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SuccessFlag {
    success: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user: UserWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserWire {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    profile_image: Option<ImageWire>,
    #[serde(default)]
    is_email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct ImageWire {
    url: Option<String>,
}

impl From<UserWire> for UserProfile {
    fn from(user: UserWire) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
            profile_image_url: user
                .profile_image
                .and_then(|image| image.url)
                .filter(|url| !url.is_empty()),
            is_email_verified: user.is_email_verified,
        }
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_expires_in: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
    #[serde(rename = "token_expires_in", skip_serializing_if = "Option::is_none")]
    token_expires_in: Option<&'a str>,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

// ============================================================================
// Client
// ============================================================================

/// Authentication API client
///
/// Clone is cheap; the transport is shared.
#[derive(Clone)]
pub struct AuthClient {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    token_expires_in: Option<String>,
}

impl AuthClient {
    /// Creates a client sending through `transport`
    ///
    /// `token_expires_in` is forwarded on login and refresh when set.
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        token_expires_in: Option<String>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            token_expires_in,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Sends `request` and maps any failure status onto the taxonomy
    async fn execute(
        &self,
        operation: Operation,
        request: ApiRequest,
    ) -> Result<ApiResponse, AuthError> {
        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(?operation, "Auth request did not complete: {}", e);
            AuthError::from(e)
        })?;

        // Some endpoints answer 200 with {"success": false}
        let flagged_failure = matches!(
            response.json::<SuccessFlag>(),
            Ok(SuccessFlag { success: Some(false) })
        );

        if response.is_success() && !flagged_failure {
            return Ok(response);
        }

        let status = if flagged_failure { 400 } else { response.status() };
        let message = AuthError::server_message(response.bytes());
        let error = AuthError::classify(operation, status, message.as_deref());
        tracing::warn!(?operation, status, "Auth request rejected: {}", error);
        Err(error)
    }

    fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, AuthError> {
        response
            .json::<Envelope<T>>()
            .map(Envelope::into_inner)
            .map_err(|e| AuthError::Unknown(format!("Failed to parse response: {}", e)))
    }

    fn decode_message(response: &ApiResponse) -> String {
        Self::decode::<MessageResponse>(response)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_default()
    }

    fn decode_tokens(response: &ApiResponse) -> Result<TokenPair, AuthError> {
        let tokens: TokenResponse = Self::decode(response)?;
        TokenPair::new(tokens.access_token, tokens.refresh_token)
            .map_err(|e| AuthError::Unknown(format!("Malformed token response: {}", e)))
    }

    /// Exchanges credentials for a token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        tracing::debug!(email = %redact::email(email), "Logging in");
        let request = ApiRequest::post(&self.endpoints.login).json(&LoginBody {
            email,
            password,
            token_expires_in: self.token_expires_in.as_deref(),
        })?;

        let response = self.execute(Operation::Login, request).await?;
        Self::decode_tokens(&response)
    }

    /// Registers a new account; returns the server's message
    pub async fn signup(&self, signup: &SignupRequest) -> Result<String, AuthError> {
        tracing::debug!(email = %redact::email(&signup.email), "Signing up");
        let mut fields = vec![
            FormField::text("email", signup.email.clone()),
            FormField::text("password", signup.password.clone()),
            FormField::text("firstName", signup.first_name.clone()),
            FormField::text("lastName", signup.last_name.clone()),
        ];
        fields.extend(signup.profile_image.as_ref().map(image_field));

        let request = ApiRequest::post(&self.endpoints.signup).multipart(fields);
        let response = self.execute(Operation::Signup, request).await?;
        Ok(Self::decode_message(&response))
    }

    /// Confirms the emailed verification code
    pub async fn verify_otp(&self, email: &str, code: &OtpCode) -> Result<String, AuthError> {
        let request = ApiRequest::post(&self.endpoints.verify_otp).json(&VerifyBody {
            email,
            otp: code.as_str(),
        })?;
        let response = self.execute(Operation::VerifyOtp, request).await?;
        Ok(Self::decode_message(&response))
    }

    /// Asks the server to send a new verification code
    pub async fn resend_otp(&self, email: &str) -> Result<String, AuthError> {
        let request = ApiRequest::post(&self.endpoints.resend_otp).json(&EmailBody { email })?;
        let response = self.execute(Operation::ResendOtp, request).await?;
        Ok(Self::decode_message(&response))
    }

    /// Starts the password reset flow
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let request =
            ApiRequest::post(&self.endpoints.forgot_password).json(&EmailBody { email })?;
        let response = self.execute(Operation::ForgotPassword, request).await?;
        Ok(Self::decode_message(&response))
    }

    /// Rotates the token pair; the old refresh token is invalid afterwards
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        tracing::debug!(token = %redact::token(refresh_token), "Refreshing token pair");
        let request = ApiRequest::post(&self.endpoints.refresh).json(&RefreshBody {
            refresh_token,
            token_expires_in: self.token_expires_in.as_deref(),
        })?;

        let response = self.execute(Operation::Refresh, request).await?;
        Self::decode_tokens(&response)
    }

    /// Fetches the signed-in user
    ///
    /// Must be called on a client whose transport attaches the bearer token.
    pub async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
        let request = ApiRequest::get(&self.endpoints.profile);
        let response = self.execute(Operation::Profile, request).await?;
        let profile: ProfileResponse = Self::decode(&response)?;
        Ok(profile.user.into())
    }

    /// Updates the signed-in user's name and, optionally, their image
    ///
    /// Like [`AuthClient::fetch_profile`], needs a bearer-attaching transport.
    /// The returned profile may omit the email.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        let mut fields = vec![
            FormField::text("firstName", update.first_name.clone()),
            FormField::text("lastName", update.last_name.clone()),
        ];
        fields.extend(update.profile_image.as_ref().map(image_field));

        let request = ApiRequest::put(&self.endpoints.profile).multipart(fields);
        let response = self.execute(Operation::UpdateProfile, request).await?;
        let profile: ProfileResponse = Self::decode(&response)?;
        Ok(profile.user.into())
    }
}

fn image_field(image: &ProfileImage) -> FormField {
    FormField::File {
        name: "profileImage".into(),
        file_name: image.file_name.clone(),
        content_type: image.content_type.clone(),
        bytes: image.bytes.clone(),
    }
}

#[async_trait]
impl TokenRefresher for AuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        AuthClient::refresh(self, refresh_token).await
    }
}
