//! Observable session state
//!
//! Holds `is_authenticated` and the current user behind a watch channel so
//! any number of observers (navigation, UI) can react to changes. Writes are
//! crate-private: only the session manager and the session-aware transport
//! mutate it.
//!
//! The session epoch orders every credential write against logout. Anything
//! that writes or clears the credential store does so while holding the
//! [`EpochGuard`]; logout and login advance the epoch, so a refresh that
//! started under an older epoch can tell its result is stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, MutexGuard};

use crate::api::UserProfile;
use crate::auth::{CredentialStore, StoreError};

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub current_user: Option<UserProfile>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn signed_out() -> Self {
        Self {
            is_authenticated: false,
            current_user: None,
            updated_at: Utc::now(),
        }
    }
}

/// Exclusive access to the session epoch
///
/// Held across credential store writes so they are ordered with respect to
/// login and logout.
pub struct EpochGuard<'a> {
    epoch: MutexGuard<'a, u64>,
}

impl EpochGuard<'_> {
    pub fn current(&self) -> u64 {
        *self.epoch
    }

    /// Starts a new epoch, invalidating work tagged with the old one
    pub fn advance(&mut self) -> u64 {
        *self.epoch += 1;
        *self.epoch
    }
}

/// Shared session state
pub struct SessionState {
    tx: watch::Sender<SessionSnapshot>,
    epoch: Mutex<u64>,
}

impl SessionState {
    /// Creates a signed-out session
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::signed_out());
        Self {
            tx,
            epoch: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.tx.borrow().current_user.clone()
    }

    /// Subscribes to changes; the receiver starts at the current snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) async fn lock_epoch(&self) -> EpochGuard<'_> {
        EpochGuard {
            epoch: self.epoch.lock().await,
        }
    }

    pub(crate) async fn current_epoch(&self) -> u64 {
        *self.epoch.lock().await
    }

    pub(crate) fn mark_authenticated(&self) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.is_authenticated {
                return false;
            }
            snapshot.is_authenticated = true;
            snapshot.updated_at = Utc::now();
            true
        });
    }

    pub(crate) fn mark_signed_out(&self) {
        self.tx.send_if_modified(|snapshot| {
            if !snapshot.is_authenticated && snapshot.current_user.is_none() {
                return false;
            }
            *snapshot = SessionSnapshot::signed_out();
            true
        });
    }

    pub(crate) fn set_user(&self, user: Option<UserProfile>) {
        self.tx.send_modify(|snapshot| {
            snapshot.current_user = user;
            snapshot.updated_at = Utc::now();
        });
    }

    /// Ends the session: advances the epoch, clears the store, and marks the
    /// session signed out. The state changes even if clearing fails.
    pub(crate) async fn end_session(
        &self,
        guard: &mut EpochGuard<'_>,
        store: &dyn CredentialStore,
    ) -> Result<(), StoreError> {
        guard.advance();
        let cleared = store.clear().await;
        self.mark_signed_out();
        tracing::info!(epoch = guard.current(), "Session ended");
        cleared
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
