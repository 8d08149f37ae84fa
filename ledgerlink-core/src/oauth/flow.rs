//! Authorization Code grant against the provider's token endpoint.
//!
//! # Flow Overview
//!
//! 1. Build the authorization URL with a random `state`
//! 2. User approves access in the browser
//! 3. Provider redirects to the registered URI with `code`, `state` and `realmId`
//! 4. Exchange the code for an access/refresh token pair
//! 5. Later, exchange the refresh token for a new pair
//!
//! Neither exchange is ever retried here. An authorization code is single
//! use, and replaying a consumed one only earns an `invalid_grant`.

use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{AuthorizationCode, CsrfToken, RefreshToken, RequestTokenError, Scope, TokenResponse};
use url::Url;

use super::create_oauth_client;
use crate::config::CredentialConfig;
use crate::token::{AuthError, CredentialRecord};

/// Access token lifetime assumed when the provider omits `expires_in`.
const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Authorization-code flow bound to one client configuration.
pub struct AuthorizationCodeFlow {
    client: BasicClient,
    scopes: Vec<String>,
}

impl AuthorizationCodeFlow {
    /// Create a flow for the given configuration.
    pub fn new(config: &CredentialConfig) -> Result<Self, AuthError> {
        Ok(Self {
            client: create_oauth_client(config)?,
            scopes: config.provider.default_scopes.clone(),
        })
    }

    /// Build an authorization URL for the user to visit.
    ///
    /// Returns the URL and the random `state` it carries; the redirect must
    /// echo the same state back.
    pub fn authorization_url(&self) -> (Url, String) {
        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, state) = request.url();
        (url, state.secret().to_string())
    }

    /// Exchange an authorization code for the initial credential record.
    ///
    /// Any failure is an [`AuthError::Authorization`]: the code has been
    /// spent either way and the user must approve again.
    pub async fn exchange_code(
        &self,
        code: &str,
        realm_id: Option<String>,
    ) -> Result<CredentialRecord, AuthError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::Authorization {
                message: format!("token exchange failed: {}", describe(&e)),
            })?;

        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .ok_or_else(|| AuthError::Authorization {
                message: "token response did not include a refresh token".to_string(),
            })?;

        let mut record = CredentialRecord::new(
            response.access_token().secret().as_str(),
            refresh_token,
            expiry_of(&response)?,
        );
        record.realm_id = realm_id;

        Ok(record)
    }

    /// Exchange `current`'s refresh token for a new access token.
    ///
    /// A rejection by the provider means the refresh token is revoked or
    /// expired and surfaces as [`AuthError::ReauthorizationRequired`].
    /// Transport failures surface as [`AuthError::Network`].
    pub async fn refresh(&self, current: &CredentialRecord) -> Result<CredentialRecord, AuthError> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(
                current.refresh_token.expose().to_string(),
            ))
            .request_async(async_http_client)
            .await
            .map_err(|e| match &e {
                RequestTokenError::ServerResponse(_) => AuthError::ReauthorizationRequired {
                    message: format!("refresh token rejected: {}", describe(&e)),
                },
                _ => AuthError::Network {
                    message: format!("token refresh failed: {}", describe(&e)),
                },
            })?;

        Ok(current.refreshed(
            response.access_token().secret().as_str(),
            response.refresh_token().map(|t| t.secret().to_string()),
            expiry_of(&response)?,
        ))
    }
}

fn expiry_of(response: &BasicTokenResponse) -> Result<chrono::DateTime<Utc>, AuthError> {
    let lifetime = match response.expires_in() {
        Some(duration) => Duration::from_std(duration).map_err(|e| AuthError::Network {
            message: format!("invalid expiration duration: {}", e),
        })?,
        None => Duration::seconds(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS),
    };
    Ok(Utc::now() + lifetime)
}

fn describe<RE: std::error::Error + 'static>(
    err: &RequestTokenError<RE, BasicErrorResponse>,
) -> String {
    match err {
        RequestTokenError::ServerResponse(response) => response.to_string(),
        RequestTokenError::Request(inner) => inner.to_string(),
        RequestTokenError::Parse(inner, _) => format!("unexpected response body: {}", inner),
        RequestTokenError::Other(message) => message.clone(),
    }
}

impl std::fmt::Debug for AuthorizationCodeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeFlow")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
