//! CLI configuration handling.
//!
//! Settings come from a TOML file, looked up in this order:
//! 1. the path given with `--config`
//! 2. `ledgerlink.toml` in the working directory
//! 3. `ledgerlink.toml` in the platform config directory
//!
//! `LEDGERLINK_CLIENT_ID` and `LEDGERLINK_CLIENT_SECRET` override the file.

use anyhow::{Context, Result, bail};
use chrono::Duration;
use directories::ProjectDirs;
use ledgerlink_core::api::DEFAULT_MINOR_VERSION;
use ledgerlink_core::config::{
    DEFAULT_CREDENTIAL_FILE, DEFAULT_EXPIRY_MARGIN_SECS, DEFAULT_KEY_FILE, DEFAULT_REDIRECT_URI,
};
use ledgerlink_core::{CredentialConfig, Environment, StorePaths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "ledgerlink.toml";

pub const CLIENT_ID_VAR: &str = "LEDGERLINK_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "LEDGERLINK_CLIENT_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// OAuth client id from the developer portal.
    pub client_id: Option<String>,

    /// OAuth client secret from the developer portal.
    pub client_secret: Option<String>,

    /// Redirect URI registered for the app.
    pub redirect_uri: String,

    /// `sandbox` or `production`.
    pub environment: Environment,

    /// Encrypted credential file.
    pub credential_path: PathBuf,

    /// Encryption key file.
    pub key_path: PathBuf,

    /// Seconds before expiry at which a token is refreshed.
    pub expiry_margin_secs: i64,

    /// API minor version sent with queries.
    pub minor_version: u32,

    /// Path of the configuration file that was loaded, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            environment: Environment::default(),
            credential_path: PathBuf::from(DEFAULT_CREDENTIAL_FILE),
            key_path: PathBuf::from(DEFAULT_KEY_FILE),
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
            minor_version: DEFAULT_MINOR_VERSION,
            config_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or the first config file found, then
    /// apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match find_config_file() {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        settings.apply_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;

        settings.config_path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Replace client credentials with values from `lookup`, when present.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(CLIENT_ID_VAR).filter(|v| !v.is_empty()) {
            self.client_id = Some(id);
        }
        if let Some(secret) = lookup(CLIENT_SECRET_VAR).filter(|v| !v.is_empty()) {
            self.client_secret = Some(secret);
        }
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(&self.credential_path, &self.key_path)
    }

    /// Build the credential manager configuration.
    ///
    /// Fails if the client id or secret is missing.
    pub fn credential_config(&self) -> Result<CredentialConfig> {
        let Some(client_id) = self.client_id.as_deref().filter(|v| !v.is_empty()) else {
            bail!(
                "client_id is not configured; set it in {} or {}",
                CONFIG_FILE_NAME,
                CLIENT_ID_VAR
            );
        };
        let Some(client_secret) = self.client_secret.as_deref().filter(|v| !v.is_empty()) else {
            bail!(
                "client_secret is not configured; set it in {} or {}",
                CONFIG_FILE_NAME,
                CLIENT_SECRET_VAR
            );
        };
        if self.expiry_margin_secs < 0 {
            bail!("expiry_margin_secs must not be negative");
        }

        Ok(CredentialConfig::new(client_id, client_secret)
            .with_redirect_uri(&self.redirect_uri)
            .with_environment(self.environment)
            .with_store_paths(self.store_paths())
            .with_expiry_margin(Duration::seconds(self.expiry_margin_secs)))
    }
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    project_dirs()
        .map(|d| d.config_dir().join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ledgerlink", "ledgerlink")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.redirect_uri, "https://localhost:8000/callback");
        assert_eq!(settings.environment, Environment::Sandbox);
        assert_eq!(settings.credential_path, PathBuf::from("qbo_tokens.json"));
        assert_eq!(settings.key_path, PathBuf::from("encrypt.key"));
        assert_eq!(settings.expiry_margin_secs, 60);
        assert_eq!(settings.minor_version, 73);
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
client_id = "ABcd"
client_secret = "s3cret"
environment = "production"
credential_path = "/var/lib/ledgerlink/qbo_tokens.json"
expiry_margin_secs = 120
"#,
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();

        assert_eq!(settings.client_id.as_deref(), Some("ABcd"));
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(
            settings.credential_path,
            PathBuf::from("/var/lib/ledgerlink/qbo_tokens.json")
        );
        assert_eq!(settings.key_path, PathBuf::from("encrypt.key"));
        assert_eq!(settings.config_path.as_deref(), Some(path.as_path()));

        let config = settings.credential_config().unwrap();
        assert_eq!(config.client_id, "ABcd");
        assert_eq!(config.client_secret.expose(), "s3cret");
        assert_eq!(config.expiry_margin, Duration::seconds(120));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "clientid = \"typo\"\n").unwrap();

        assert!(Settings::from_file(&path).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (CLIENT_ID_VAR, "from-env"),
            (CLIENT_SECRET_VAR, ""),
        ]);
        let mut settings = Settings {
            client_id: Some("from-file".to_string()),
            client_secret: Some("file-secret".to_string()),
            ..Default::default()
        };

        settings.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.client_id.as_deref(), Some("from-env"));
        // Empty variables do not clobber the file
        assert_eq!(settings.client_secret.as_deref(), Some("file-secret"));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let settings = Settings {
            client_id: Some("id".to_string()),
            ..Default::default()
        };
        let err = settings.credential_config().unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }
}
