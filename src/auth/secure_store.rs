//! Secure token storage using the OS credential manager
//!
//! Stores the session's token pair in a single named keyring slot
//! (Keychain on macOS, Credential Manager on Windows, Secret Service on
//! Linux) as a JSON document.

use std::sync::Arc;

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::tokens::TokenPair;

/// Default keyring service name
pub const DEFAULT_SERVICE: &str = "StorefrontSession";

/// Account name of the single slot holding the token pair
const TOKEN_SLOT: &str = "auth_tokens";

/// Errors that can occur during secure storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Keyring operation failed (locked, permission denied, no backend)
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Stored payload could not be decoded
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Storage backend is not reachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for the session's token pair
///
/// Implementations hold exactly one pair. Reads never observe a partially
/// written pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the stored pair, or `None` when nothing is stored
    async fn get(&self) -> Result<Option<TokenPair>, StoreError>;

    /// Replaces any stored pair
    async fn set(&self, pair: &TokenPair) -> Result<(), StoreError>;

    /// Removes the stored pair; succeeds when nothing is stored
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Keyring-backed credential store
///
/// Every operation takes the same lock and runs on the blocking pool, so
/// concurrent request paths see whole pairs only.
///
/// # Example
///
/// ```no_run
/// use storefront_session::auth::{CredentialStore, KeyringStore, TokenPair};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let store = KeyringStore::new("StorefrontSession")?;
/// store.set(&TokenPair::new("access", "refresh")?).await?;
/// assert!(store.get().await?.is_some());
/// store.clear().await?;
/// # Ok(())
/// # }
/// ```
pub struct KeyringStore {
    service: String,
    entry: Arc<Entry>,
    lock: Mutex<()>,
}

impl KeyringStore {
    /// Creates a store bound to the given keyring service
    pub fn new(service: impl Into<String>) -> Result<Self, StoreError> {
        let service = service.into();
        let entry = Entry::new(&service, TOKEN_SLOT)?;
        Ok(Self {
            service,
            entry: Arc::new(entry),
            lock: Mutex::new(()),
        })
    }

    /// Returns the service name used for this store
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Entry) -> Result<T, StoreError> + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let entry = Arc::clone(&self.entry);
        tokio::task::spawn_blocking(move || op(&entry))
            .await
            .map_err(|e| StoreError::Unavailable(format!("keyring task failed: {}", e)))?
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        self.with_entry(|entry| match entry.get_password() {
            Ok(payload) => serde_json::from_str::<TokenPair>(&payload)
                .map(Some)
                .map_err(|e| StoreError::InvalidFormat(e.to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(e)),
        })
        .await
    }

    async fn set(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(pair).map_err(|e| StoreError::InvalidFormat(e.to_string()))?;
        self.with_entry(move |entry| {
            entry.set_password(&payload)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.with_entry(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keyring(e)),
        })
        .await
    }
}

/// In-process credential store
///
/// Holds the pair for the lifetime of the process only. Used for ephemeral
/// sessions and in tests.
#[derive(Default)]
pub struct MemoryStore {
    slot: RwLock<Option<TokenPair>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `pair`
    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            slot: RwLock::new(Some(pair)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.slot.read().await.clone())
    }

    async fn set(&self, pair: &TokenPair) -> Result<(), StoreError> {
        *self.slot.write().await = Some(pair.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.slot.write().await = None;
        Ok(())
    }
}
