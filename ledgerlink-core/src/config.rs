//! Credential manager configuration.
//!
//! Everything the manager needs is passed in through [`CredentialConfig`];
//! there are no process-wide constants to patch in tests.

use std::path::PathBuf;

use chrono::Duration;

use crate::provider::{Environment, ProviderConfig};
use crate::store::Secret;

/// Redirect target registered with the provider.
pub const DEFAULT_REDIRECT_URI: &str = "https://localhost:8000/callback";

/// Default credential file name, relative to the working directory.
pub const DEFAULT_CREDENTIAL_FILE: &str = "qbo_tokens.json";

/// Default key file name, relative to the working directory.
pub const DEFAULT_KEY_FILE: &str = "encrypt.key";

/// Seconds before expiry at which an access token is treated as expired.
pub const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 60;

/// Locations of the two files owned by the encrypted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// Encrypted credential record.
    pub credential_path: PathBuf,

    /// Base64 encryption key.
    pub key_path: PathBuf,
}

impl StorePaths {
    pub fn new(credential_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            credential_path: credential_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Both files inside `dir`, using the default names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self::new(dir.join(DEFAULT_CREDENTIAL_FILE), dir.join(DEFAULT_KEY_FILE))
    }
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_FILE, DEFAULT_KEY_FILE)
    }
}

/// Configuration handed to [`CredentialManager`](crate::manager::CredentialManager).
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Provider endpoints and scopes.
    pub provider: ProviderConfig,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: Secret,

    /// Redirect URI registered with the provider.
    pub redirect_uri: String,

    /// Sandbox or production API host.
    pub environment: Environment,

    /// Where the encrypted store keeps its files.
    pub store: StorePaths,

    /// Safety margin before expiry.
    pub expiry_margin: Duration,
}

impl CredentialConfig {
    /// Create a configuration for the Intuit provider with default paths,
    /// redirect target and margin.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::intuit(),
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            environment: Environment::default(),
            store: StorePaths::default(),
            expiry_margin: Duration::seconds(DEFAULT_EXPIRY_MARGIN_SECS),
        }
    }

    /// Replace the provider endpoints.
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Set the redirect URI.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Select the API environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the store file locations.
    pub fn with_store_paths(mut self, store: StorePaths) -> Self {
        self.store = store;
        self
    }

    /// Set the expiry safety margin.
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }
}
