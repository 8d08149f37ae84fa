//! Credential storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Trait for credential record backends
//! - [`EncryptedFileStore`] - AES-256-GCM encrypted file on disk
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`EncryptionKey`] - Explicitly provisioned key material
//!
//! # Storage Layout
//!
//! The encrypted store keeps two files side by side: the credential file
//! (a JSON envelope holding nonce and ciphertext) and the key file. Neither
//! is useful without the other.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerlink_core::config::StorePaths;
//! use ledgerlink_core::store::{CredentialStore, EncryptedFileStore};
//!
//! let store = EncryptedFileStore::provision(&StorePaths::default()).await?;
//! if let Some(record) = store.load().await? {
//!     println!("realm: {:?}", record.realm_id);
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::token::CredentialRecord;

mod crypto;
mod file;
mod key;
mod memory;

pub use file::{EncryptedFileStore, ENVELOPE_VERSION};
pub use key::{EncryptionKey, KeyProvisioning};
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
/// The backing memory is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored data could not be decrypted or parsed.
    #[error("credential store is corrupt: {message}")]
    Corrupt { message: String },

    /// Reading or writing one of the store files failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization of a record failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The encryption backend reported a failure.
    #[error("encryption error: {message}")]
    Crypto { message: String },
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

/// Abstraction over credential record backends.
///
/// A store holds at most one [`CredentialRecord`], the one for the
/// currently connected company.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored record.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet.
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError>;

    /// Persist a record, replacing any existing one.
    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError>;

    /// Delete the stored record.
    ///
    /// Returns `Ok(())` even if nothing was stored.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Check whether a record exists.
    async fn exists(&self) -> Result<bool, StoreError> {
        Ok(self.load().await?.is_some())
    }
}
