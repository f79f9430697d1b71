//! Storefront session - authenticated session lifecycle for the storefront client
//!
//! Keeps a user signed in across restarts and token expiry.
//!
//! ## Features
//!
//! - Token pair persisted in the platform keyring
//! - Session-aware HTTP transport attaching the bearer token
//! - Single-flight token refresh with at most one replay per request
//! - Observable session state for UI and navigation
//! - Login, signup with email verification, and password reset flows
//!
//! ## Architecture
//!
//! - **Auth**: Token pair and secure credential storage
//! - **Http**: Bare transport and the session-aware decorator
//! - **Api**: Typed auth endpoints and the error taxonomy
//! - **Session**: State, bootstrap, and the session manager
//!
//! ```no_run
//! use storefront_session::{config::AppConfig, SessionManager};
//!
//! # async fn demo() -> Result<(), storefront_session::api::AuthError> {
//! let manager = SessionManager::from_config(&AppConfig::load())?;
//! if !manager.bootstrap().await {
//!     manager.login("user@example.com", "correct-horse").await?;
//! }
//! let mut changes = manager.state().subscribe();
//! # let _ = changes.borrow_and_update();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod http;
pub mod redact;
pub mod session;
pub mod validation;

pub use api::{AuthClient, AuthError, UserProfile};
pub use auth::{CredentialStore, KeyringStore, TokenPair};
pub use http::{SessionAwareTransport, Transport};
pub use session::{SessionManager, SessionSnapshot, SessionState};
