//! Credential records and authentication errors.
//!
//! This module provides:
//! - [`CredentialRecord`] - The persisted token pair, expiry and company id
//! - [`AuthError`] - Everything that can stop a valid token from being produced

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Secret, StoreError};

/// Error type for credential operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user did not complete the consent screen, the provider refused
    /// it, or the authorization code was rejected.
    #[error("authorization failed: {message}")]
    Authorization { message: String },

    /// The pasted redirect URL was unusable.
    #[error("invalid redirect URL: {message}")]
    InvalidRedirect { message: String },

    /// The refresh token was rejected; the interactive flow must run again.
    #[error("reauthorization required: {message}")]
    ReauthorizationRequired { message: String },

    /// The stored credential file could not be decrypted or parsed.
    #[error("credential store is corrupt: {message}")]
    CorruptCredentialStore { message: String },

    /// The token endpoint could not be reached or answered nonsense.
    #[error("network error: {message}")]
    Network { message: String },

    /// Storage error during credential operations.
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// The configured endpoints or redirect target are invalid.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl AuthError {
    /// Whether recovering requires the user to delete the store and log in
    /// again.
    pub fn requires_new_login(&self) -> bool {
        matches!(
            self,
            Self::ReauthorizationRequired { .. } | Self::CorruptCredentialStore { .. }
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { message } => Self::CorruptCredentialStore { message },
            other => Self::Storage(other),
        }
    }
}

/// The persisted credentials for one connected company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Bearer token for API calls.
    pub access_token: Secret,

    /// Long-lived token used to obtain new access tokens.
    pub refresh_token: Secret,

    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,

    /// Company (realm) the tokens are scoped to.
    #[serde(default)]
    pub realm_id: Option<String>,

    /// When this record was last written by an exchange or refresh.
    pub refreshed_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Create a record from a fresh token pair.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
            expires_at,
            realm_id: None,
            refreshed_at: Utc::now(),
        }
    }

    /// Attach the company id.
    pub fn with_realm_id(mut self, realm_id: impl Into<String>) -> Self {
        self.realm_id = Some(realm_id.into());
        self
    }

    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Check if the access token expires within `margin` from now.
    ///
    /// A token expiring exactly at `now + margin` counts as expiring.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at <= Utc::now() + margin
    }

    /// Build the successor record after a refresh.
    ///
    /// The realm carries over. When the provider did not rotate the refresh
    /// token, the current one is kept.
    pub fn refreshed(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: refresh_token
                .map(Secret::new)
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at,
            realm_id: self.realm_id.clone(),
            refreshed_at: Utc::now(),
        }
    }
}
