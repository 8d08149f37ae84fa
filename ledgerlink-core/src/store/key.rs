//! Encryption key provisioning.
//!
//! The key lives in its own file, base64 encoded. Provisioning is an
//! explicit step: callers decide when a missing key may be generated, and
//! learn whether it was.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::crypto::{self, KEY_LEN};
use super::{StoreError, file::write_private};

/// Outcome of [`EncryptionKey::provision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProvisioning {
    /// An existing key file was read.
    Loaded,
    /// No key file existed; a new key was generated and written.
    Generated,
}

/// Symmetric key protecting the credential file.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Result<Self, StoreError> {
        Ok(Self {
            bytes: crypto::random_key()?,
        })
    }

    /// Decode a key from its base64 file representation.
    pub fn from_base64(encoded: &str) -> Result<Self, StoreError> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| StoreError::corrupt(format!("key file is not valid base64: {}", e)))?,
        );

        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            StoreError::corrupt(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            ))
        })?;

        Ok(Self { bytes })
    }

    /// Encode the key for writing to disk.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.bytes))
    }

    /// Read a key file.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub async fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let contents = Zeroizing::new(contents);
                Self::from_base64(&contents).map(Some)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Load the key at `path`, generating and writing a new one if absent.
    pub async fn provision(path: &Path) -> Result<(Self, KeyProvisioning), StoreError> {
        if let Some(key) = Self::load(path).await? {
            tracing::debug!("Loaded encryption key from {}", path.display());
            return Ok((key, KeyProvisioning::Loaded));
        }

        let key = Self::generate()?;
        let mut encoded = key.to_base64();
        encoded.push('\n');
        write_private(path, encoded.as_bytes()).await?;

        tracing::info!("Generated new encryption key at {}", path.display());
        Ok((key, KeyProvisioning::Generated))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}
