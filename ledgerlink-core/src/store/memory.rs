//! In-memory credential storage implementation.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CredentialStore, StoreError};
use crate::token::CredentialRecord;

/// In-memory credential store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
/// It counts saves so tests can assert when persistence happened.
pub struct MemoryStore {
    record: RwLock<Option<CredentialRecord>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            record: RwLock::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    /// Create a memory store holding `record`.
    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of times [`CredentialStore::save`] has been called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("has_record", &self.record.read().is_some())
            .field("saves", &self.save_count())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.record.read().clone())
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        *self.record.write() = Some(record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.record.write() = None;
        Ok(())
    }
}
