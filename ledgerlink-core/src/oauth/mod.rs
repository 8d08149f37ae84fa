//! OAuth 2.0 flow implementations.
//!
//! This module provides:
//! - [`flow`] - Authorization-code URL construction, code exchange and refresh
//! - [`redirect`] - Parsing the provider redirect and the [`RedirectResolver`]
//!   capability that obtains it from the user

pub mod flow;
pub mod redirect;

pub use flow::AuthorizationCodeFlow;
pub use redirect::{
    AuthorizationCallback, RedirectResolver, TerminalRedirectResolver, parse_redirect,
};

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl, basic::BasicClient};

use crate::config::CredentialConfig;
use crate::token::AuthError;

/// Create an OAuth2 client from the credential configuration.
///
/// The client authenticates to the token endpoint with HTTP Basic using the
/// configured client id and secret, and is bound to the configured redirect
/// URI.
pub fn create_oauth_client(config: &CredentialConfig) -> Result<BasicClient, AuthError> {
    let auth_url = AuthUrl::new(config.provider.auth_url.clone()).map_err(|e| AuthError::Config {
        message: format!("invalid auth URL: {}", e),
    })?;

    let token_url =
        TokenUrl::new(config.provider.token_url.clone()).map_err(|e| AuthError::Config {
            message: format!("invalid token URL: {}", e),
        })?;

    let redirect_url =
        RedirectUrl::new(config.redirect_uri.clone()).map_err(|e| AuthError::Config {
            message: format!("invalid redirect URL: {}", e),
        })?;

    let client = BasicClient::new(
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(config.client_secret.expose().to_string())),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url);

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderConfig;

    #[test]
    fn test_create_oauth_client() {
        let config = CredentialConfig::new("test-client-id", "test-secret");
        assert!(create_oauth_client(&config).is_ok());
    }

    #[test]
    fn test_create_oauth_client_invalid_urls() {
        let config = CredentialConfig::new("test-client-id", "test-secret").with_provider(
            ProviderConfig::new("Broken")
                .with_auth_url("not a valid url")
                .with_token_url("https://example.com/token"),
        );

        assert!(matches!(
            create_oauth_client(&config),
            Err(AuthError::Config { .. })
        ));
    }

    #[test]
    fn test_create_oauth_client_invalid_redirect() {
        let config =
            CredentialConfig::new("test-client-id", "test-secret").with_redirect_uri("::nope");

        assert!(matches!(
            create_oauth_client(&config),
            Err(AuthError::Config { .. })
        ));
    }
}
