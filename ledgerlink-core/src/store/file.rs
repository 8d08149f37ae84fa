//! Encrypted on-disk credential store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::crypto::{self, NONCE_LEN_BYTES};
use super::{CredentialStore, EncryptionKey, KeyProvisioning, StoreError};
use crate::config::StorePaths;
use crate::token::CredentialRecord;

/// Current credential file format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// On-disk format of the credential file.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    nonce: String,
    ciphertext: String,
}

/// Credential store backed by an AES-256-GCM encrypted file.
///
/// The key is provisioned separately (see [`EncryptionKey::provision`]) and
/// handed in at construction, so no read or write ever creates key
/// material as a side effect.
#[derive(Debug)]
pub struct EncryptedFileStore {
    path: PathBuf,
    key: EncryptionKey,
}

impl EncryptedFileStore {
    /// Create a store for the credential file at `path` using `key`.
    pub fn new(path: impl Into<PathBuf>, key: EncryptionKey) -> Self {
        Self {
            path: path.into(),
            key,
        }
    }

    /// Provision the key and open the store at the configured paths.
    ///
    /// When the key had to be generated, any credential file already on
    /// disk was sealed with a key that no longer exists. It is removed so
    /// the next access falls back to the interactive flow.
    pub async fn provision(paths: &StorePaths) -> Result<Self, StoreError> {
        let (key, outcome) = EncryptionKey::provision(&paths.key_path).await?;
        let store = Self::new(&paths.credential_path, key);

        if outcome == KeyProvisioning::Generated && store.path.exists() {
            tracing::warn!(
                "Discarding {}: it was encrypted with a key that is no longer available",
                store.path.display()
            );
            store.clear().await?;
        }

        Ok(store)
    }

    /// Path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(&self, contents: &[u8]) -> Result<CredentialRecord, StoreError> {
        let envelope: Envelope = serde_json::from_slice(contents)
            .map_err(|e| StoreError::corrupt(format!("unreadable envelope: {}", e)))?;

        if envelope.version != ENVELOPE_VERSION {
            return Err(StoreError::corrupt(format!(
                "unsupported credential file version {}",
                envelope.version
            )));
        }

        let nonce_bytes = STANDARD
            .decode(&envelope.nonce)
            .map_err(|e| StoreError::corrupt(format!("invalid nonce encoding: {}", e)))?;
        let nonce: [u8; NONCE_LEN_BYTES] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::corrupt("nonce has the wrong length"))?;

        let ciphertext = STANDARD
            .decode(&envelope.ciphertext)
            .map_err(|e| StoreError::corrupt(format!("invalid ciphertext encoding: {}", e)))?;

        let plaintext = Zeroizing::new(crypto::open(&nonce, &ciphertext, self.key.as_bytes())?);

        serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::corrupt(format!("decrypted record is malformed: {}", e)))
    }

    fn encode(&self, record: &CredentialRecord) -> Result<Vec<u8>, StoreError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(record)?);
        let (nonce, ciphertext) = crypto::seal(&plaintext, self.key.as_bytes())?;

        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        };

        Ok(serde_json::to_vec_pretty(&envelope)?)
    }
}

#[async_trait]
impl CredentialStore for EncryptedFileStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let record = self.decode(&contents)?;
        tracing::debug!("Loaded credential record from {}", self.path.display());
        Ok(Some(record))
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let contents = self.encode(record)?;
        write_private(&self.path, &contents).await?;
        tracing::debug!("Saved credential record to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("Removed credential file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

/// Write `contents` to `path` readable by the owner only.
///
/// Data goes to a sibling temporary file first and is renamed into place,
/// so a crash never leaves a half-written file behind.
pub(crate) async fn write_private(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(&tmp_path)
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
