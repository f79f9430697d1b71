//! Authentication module - Token pair model and secure storage
//!
//! Provides secure storage for the session's access/refresh token pair using:
//! - The OS credential manager (via keyring crate)
//! - An in-process store for ephemeral sessions and tests

mod secure_store;
mod tokens;

pub use secure_store::{CredentialStore, KeyringStore, MemoryStore, StoreError, DEFAULT_SERVICE};
pub use tokens::{TokenPair, TokenPairError};

#[cfg(test)]
pub(crate) use secure_store::MockCredentialStore;
