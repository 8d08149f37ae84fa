//! The credential manager.
//!
//! [`CredentialManager`] hands out access tokens that are valid right now,
//! running the interactive authorization-code flow or a silent refresh when
//! needed.
//!
//! # Token policy
//!
//! - No stored record: run the interactive flow, persist, return.
//! - Stored token expires after `now + margin`: return it, no network.
//! - Otherwise: one refresh call, persist, return. A rejected refresh token
//!   is [`AuthError::ReauthorizationRequired`].
//!
//! Nothing is retried. Concurrent processes sharing one store are not
//! coordinated: if two runs refresh the same refresh token at once the
//! provider may invalidate one of them. Run one process at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use ledgerlink_core::{
//!     CredentialConfig, CredentialManager, EncryptedFileStore, TerminalRedirectResolver,
//! };
//!
//! let config = CredentialConfig::new("my-client-id", "my-client-secret");
//! let store = EncryptedFileStore::provision(&config.store).await?;
//! let manager = CredentialManager::new(config, store, TerminalRedirectResolver::new())?;
//!
//! let token = manager.get_valid_token().await?;
//! println!("Access token: {}...", &token.expose()[..8]);
//! # Ok(())
//! # }
//! ```

use crate::config::CredentialConfig;
use crate::oauth::{AuthorizationCodeFlow, RedirectResolver, parse_redirect};
use crate::store::{CredentialStore, Secret};
use crate::token::{AuthError, CredentialRecord};

/// Produces valid access tokens for API calls.
///
/// # Type Parameters
///
/// * `S` - Where the credential record is persisted
/// * `R` - How the user's redirect URL is obtained during consent
pub struct CredentialManager<S: CredentialStore, R: RedirectResolver> {
    config: CredentialConfig,
    store: S,
    resolver: R,
    flow: AuthorizationCodeFlow,
}

impl<S: CredentialStore, R: RedirectResolver> CredentialManager<S, R> {
    /// Create a manager.
    ///
    /// Fails with [`AuthError::Config`] if the configured endpoints or
    /// redirect URI are not valid URLs.
    pub fn new(config: CredentialConfig, store: S, resolver: R) -> Result<Self, AuthError> {
        let flow = AuthorizationCodeFlow::new(&config)?;
        Ok(Self {
            config,
            store,
            resolver,
            flow,
        })
    }

    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Return an access token valid for immediate use.
    pub async fn get_valid_token(&self) -> Result<Secret, AuthError> {
        Ok(self.get_valid_credentials().await?.access_token)
    }

    /// Return the full record with an access token valid for immediate use.
    pub async fn get_valid_credentials(&self) -> Result<CredentialRecord, AuthError> {
        let Some(record) = self.current().await? else {
            tracing::info!("No stored credentials, starting interactive authorization");
            return self.authorize().await;
        };

        if !self.is_token_expired(&record) {
            tracing::debug!(
                expires_at = %record.expires_at,
                "Using stored access token"
            );
            return Ok(record);
        }

        tracing::info!(
            expires_at = %record.expires_at,
            "Access token expired or about to, refreshing"
        );
        let refreshed = match self.flow.refresh(&record).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::error!("Failed to refresh access token: {}", e);
                return Err(e);
            }
        };

        self.store.save(&refreshed).await?;
        tracing::info!(
            expires_at = %refreshed.expires_at,
            "Refreshed access token"
        );

        Ok(refreshed)
    }

    /// Run the interactive authorization-code flow and persist the result.
    ///
    /// Runs regardless of what is stored, replacing it on success. This is
    /// the fallback after [`AuthError::ReauthorizationRequired`].
    pub async fn authorize(&self) -> Result<CredentialRecord, AuthError> {
        let (url, state) = self.flow.authorization_url();

        let redirect = self.resolver.resolve(&url).await?;
        let callback = parse_redirect(&redirect, &state)?;

        let record = self
            .flow
            .exchange_code(&callback.code, callback.realm_id)
            .await?;

        self.store.save(&record).await?;
        tracing::info!(
            realm_id = record.realm_id.as_deref().unwrap_or("unknown"),
            "Authorization complete, credentials saved"
        );

        Ok(record)
    }

    /// The stored record, without refreshing or prompting.
    pub async fn current(&self) -> Result<Option<CredentialRecord>, AuthError> {
        Ok(self.store.load().await?)
    }

    /// Company id of the stored record.
    pub async fn realm_id(&self) -> Result<Option<String>, AuthError> {
        Ok(self.current().await?.and_then(|r| r.realm_id))
    }

    /// Delete the stored record so the next call authorizes again.
    pub async fn forget(&self) -> Result<(), AuthError> {
        self.store.clear().await?;
        tracing::info!("Forgot stored credentials");
        Ok(())
    }

    /// Check if a record's access token is expired or inside the margin.
    pub fn is_token_expired(&self, record: &CredentialRecord) -> bool {
        record.expires_within(self.config.expiry_margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use url::Url;

    /// Resolver that always answers with a fixed string.
    struct Scripted(&'static str);

    #[async_trait]
    impl RedirectResolver for Scripted {
        async fn resolve(&self, _authorization_url: &Url) -> Result<String, AuthError> {
            Ok(self.0.to_string())
        }
    }

    /// Resolver standing in for a user who closed the browser.
    struct Abandoned;

    #[async_trait]
    impl RedirectResolver for Abandoned {
        async fn resolve(&self, _authorization_url: &Url) -> Result<String, AuthError> {
            Err(AuthError::Authorization {
                message: "user abandoned consent".to_string(),
            })
        }
    }

    fn config() -> CredentialConfig {
        CredentialConfig::new("client-id", "client-secret")
    }

    #[tokio::test]
    async fn test_valid_token_returned_without_save() {
        let record = CredentialRecord::new("valid-token", "refresh", Utc::now() + Duration::hours(1))
            .with_realm_id("123");
        let manager =
            CredentialManager::new(config(), MemoryStore::with_record(record), Abandoned).unwrap();

        let token = manager.get_valid_token().await.unwrap();

        assert_eq!(token.expose(), "valid-token");
        assert_eq!(manager.store().save_count(), 0);
        assert_eq!(manager.realm_id().await.unwrap().as_deref(), Some("123"));
    }

    #[tokio::test]
    async fn test_missing_record_without_consent_is_authorization_error() {
        let manager = CredentialManager::new(config(), MemoryStore::new(), Abandoned).unwrap();

        let result = manager.get_valid_token().await;

        assert!(matches!(result, Err(AuthError::Authorization { .. })));
        assert_eq!(manager.store().save_count(), 0);
    }

    #[tokio::test]
    async fn test_redirect_without_code_is_invalid() {
        let manager = CredentialManager::new(
            config(),
            MemoryStore::new(),
            Scripted("https://localhost:8000/callback?state=whatever"),
        )
        .unwrap();

        let result = manager.get_valid_token().await;

        assert!(matches!(result, Err(AuthError::InvalidRedirect { .. })));
        assert!(manager.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_margin_applies() {
        let manager = CredentialManager::new(
            config().with_expiry_margin(Duration::seconds(60)),
            MemoryStore::new(),
            Abandoned,
        )
        .unwrap();

        let soon = CredentialRecord::new("a", "r", Utc::now() + Duration::seconds(30));
        let later = CredentialRecord::new("a", "r", Utc::now() + Duration::minutes(10));

        assert!(manager.is_token_expired(&soon));
        assert!(!manager.is_token_expired(&later));
    }

    #[tokio::test]
    async fn test_forget_clears_store() {
        let record = CredentialRecord::new("a", "r", Utc::now() + Duration::hours(1));
        let manager =
            CredentialManager::new(config(), MemoryStore::with_record(record), Abandoned).unwrap();

        manager.forget().await.unwrap();

        assert!(manager.current().await.unwrap().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = CredentialManager::new(
            config().with_redirect_uri("not a url"),
            MemoryStore::new(),
            Abandoned,
        );
        assert!(matches!(result, Err(AuthError::Config { .. })));
    }
}
