//! Session manager
//!
//! Owns the credential store, the observable state, and the two API clients:
//! one on the bare transport for the public auth endpoints and one on the
//! session-aware transport for authenticated calls.

use std::sync::Arc;

use crate::api::{AuthClient, AuthError, ProfileUpdate, SignupRequest, UserProfile};
use crate::auth::{CredentialStore, KeyringStore, TokenPair};
use crate::config::AppConfig;
use crate::http::{ReqwestTransport, SessionAwareTransport, Transport};
use crate::redact;
use crate::validation::{self, OtpCode};

use super::bootstrap::bootstrap;
use super::state::SessionState;

/// Drives the login, signup, and logout flows
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    state: Arc<SessionState>,
    public: AuthClient,
    authenticated: AuthClient,
    transport: SessionAwareTransport,
}

impl SessionManager {
    /// Creates a manager backed by the network and the platform keyring
    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        let transport = ReqwestTransport::new(&config.api_base_url, config.request_timeout())?;
        let store = KeyringStore::new(config.keyring_service.clone())?;
        Ok(Self::with_parts(Arc::new(transport), Arc::new(store), config))
    }

    /// Creates a manager from an explicit transport and store
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        config: &AppConfig,
    ) -> Self {
        let state = Arc::new(SessionState::new());
        let endpoints = config.endpoints();

        let public = AuthClient::new(
            Arc::clone(&transport),
            endpoints.clone(),
            config.token_expires_in.clone(),
        );
        let session_transport = SessionAwareTransport::new(
            transport,
            Arc::clone(&store),
            Arc::new(public.clone()),
            Arc::clone(&state),
        );
        let authenticated = AuthClient::new(
            Arc::new(session_transport.clone()),
            endpoints,
            config.token_expires_in.clone(),
        );

        Self {
            store,
            state,
            public,
            authenticated,
            transport: session_transport,
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Transport for authenticated product and catalog calls
    pub fn transport(&self) -> &SessionAwareTransport {
        &self.transport
    }

    /// Restores any stored session; performs no network I/O
    pub async fn bootstrap(&self) -> bool {
        bootstrap(self.store.as_ref(), &self.state).await
    }

    /// Signs in with email and password
    ///
    /// On success the tokens are stored and the session is authenticated. The
    /// profile is then fetched; failing that does not fail the login.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = email.trim();
        validation::validate_email(email)?;
        validation::validate_login_password(password)?;

        let pair = self.public.login(email, password).await?;
        self.establish(pair).await?;
        tracing::info!(email = %redact::email(email), "Logged in");

        if let Err(e) = self.refresh_profile().await {
            tracing::warn!("Logged in but could not load profile: {}", e);
        }
        Ok(())
    }

    /// Stores a fresh pair and starts a new session epoch
    async fn establish(&self, pair: TokenPair) -> Result<(), AuthError> {
        let mut guard = self.state.lock_epoch().await;
        guard.advance();

        if let Err(e) = self.store.set(&pair).await {
            tracing::error!("Failed to store tokens: {}", e);
            if let Err(clear_err) = self.store.clear().await {
                tracing::warn!("Failed to clear credentials: {}", clear_err);
            }
            self.state.mark_signed_out();
            return Err(e.into());
        }

        self.state.set_user(None);
        self.state.mark_authenticated();
        Ok(())
    }

    /// Registers a new account; a verification code is emailed on success
    pub async fn signup(&self, request: &SignupRequest) -> Result<String, AuthError> {
        validation::validate_name("First name", &request.first_name)?;
        validation::validate_name("Last name", &request.last_name)?;
        validation::validate_email(&request.email)?;
        validation::validate_new_password(&request.password)?;

        let request = SignupRequest {
            email: request.email.trim().to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            ..request.clone()
        };
        self.public.signup(&request).await
    }

    /// Confirms the emailed code without signing in
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<String, AuthError> {
        let email = email.trim();
        validation::validate_email(email)?;
        let code = OtpCode::parse(code)?;
        self.public.verify_otp(email, &code).await
    }

    /// Confirms the emailed code and signs in with the signup password
    pub async fn verify_and_login(
        &self,
        email: &str,
        code: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        self.verify_otp(email, code).await?;
        self.login(email, password).await
    }

    pub async fn resend_otp(&self, email: &str) -> Result<String, AuthError> {
        let email = email.trim();
        validation::validate_email(email)?;
        self.public.resend_otp(email).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = email.trim();
        validation::validate_email(email)?;
        self.public.forgot_password(email).await
    }

    /// Ends the session
    ///
    /// The session is signed out even when the store cannot be cleared; that
    /// failure is still reported.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let mut guard = self.state.lock_epoch().await;
        self.state
            .end_session(&mut guard, self.store.as_ref())
            .await
            .map_err(|e| {
                tracing::error!("Signed out but failed to clear credentials: {}", e);
                AuthError::from(e)
            })
    }

    /// Fails with `SessionTerminated` unless a token pair is stored
    ///
    /// An unreadable store counts as no session.
    async fn require_session(&self) -> Result<(), AuthError> {
        match self.store.get().await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(AuthError::SessionTerminated),
            Err(e) => {
                tracing::warn!("Could not read stored credentials: {}", e);
                Err(AuthError::SessionTerminated)
            }
        }
    }

    /// Publishes `profile` unless the session changed since `epoch`
    async fn apply_profile(&self, epoch: u64, profile: &UserProfile) {
        let guard = self.state.lock_epoch().await;
        if guard.current() == epoch {
            self.state.set_user(Some(profile.clone()));
        } else {
            tracing::debug!("Session changed while loading profile, not applying it");
        }
    }

    /// Loads the signed-in user into the session state
    pub async fn refresh_profile(&self) -> Result<UserProfile, AuthError> {
        self.require_session().await?;

        let epoch = self.state.current_epoch().await;
        let profile = self.authenticated.fetch_profile().await?;
        self.apply_profile(epoch, &profile).await;
        Ok(profile)
    }

    /// Changes the signed-in user's name and image
    ///
    /// The known email is kept when the server's answer leaves it out.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        validation::validate_name("First name", &update.first_name)?;
        validation::validate_name("Last name", &update.last_name)?;
        self.require_session().await?;

        let update = ProfileUpdate {
            first_name: update.first_name.trim().to_string(),
            last_name: update.last_name.trim().to_string(),
            ..update.clone()
        };

        let epoch = self.state.current_epoch().await;
        let mut profile = self.authenticated.update_profile(&update).await?;
        if let Some(current) = self.state.current_user() {
            if !current.email.is_empty() {
                profile.email = current.email;
            }
        }

        self.apply_profile(epoch, &profile).await;
        tracing::info!("Profile updated");
        Ok(profile)
    }
}
