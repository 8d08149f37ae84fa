//! # Ledgerlink Core
//!
//! OAuth 2.0 credential management for the QuickBooks Online accounting API.
//!
//! This crate provides:
//! - [`CredentialManager`], which hands out valid access tokens, running the
//!   authorization-code flow or a silent refresh as needed
//! - An encrypted on-disk credential store with an explicitly provisioned key
//! - The [`RedirectResolver`] capability that obtains the consent redirect
//! - A pass-through [`QueryClient`] for the accounting query endpoint
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledgerlink_core::{
//!     CredentialConfig, CredentialManager, EncryptedFileStore, Environment, QueryClient,
//!     TerminalRedirectResolver,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CredentialConfig::new("client-id", "client-secret");
//! let store = EncryptedFileStore::provision(&config.store).await?;
//! let manager = CredentialManager::new(config, store, TerminalRedirectResolver::new())?;
//!
//! let record = manager.get_valid_credentials().await?;
//! let realm_id = record.realm_id.clone().unwrap_or_default();
//!
//! let client = QueryClient::new(Environment::Sandbox, 73)?;
//! let page = client
//!     .query(&record.access_token, &realm_id, "SELECT * FROM Item")
//!     .await?;
//! println!("{} rows", page.rows.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod manager;
pub mod oauth;
pub mod provider;
pub mod store;
pub mod token;

// Re-export commonly used types at crate root
pub use api::{ApiError, QueryClient, QueryPage};

pub use config::{CredentialConfig, StorePaths};

pub use manager::CredentialManager;

pub use oauth::{
    AuthorizationCallback,
    AuthorizationCodeFlow,
    RedirectResolver,
    TerminalRedirectResolver,
    parse_redirect,
};

pub use provider::{Environment, ProviderConfig};

pub use store::{
    CredentialStore,
    EncryptedFileStore,
    EncryptionKey,
    KeyProvisioning,
    MemoryStore,
    Secret,
    StoreError,
};

pub use token::{AuthError, CredentialRecord};
