//! OAuth provider endpoints and API environments.
//!
//! This module provides:
//! - [`ProviderConfig`] - Authorization and token endpoints plus default scopes
//! - [`Environment`] - Sandbox/production switch for the accounting API

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intuit authorization (consent screen) endpoint.
pub const INTUIT_AUTH_URL: &str = "https://appcenter.intuit.com/connect/oauth2";

/// Intuit token endpoint, shared by the code and refresh grants.
pub const INTUIT_TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";

/// Scope granting access to the accounting API.
pub const ACCOUNTING_SCOPE: &str = "com.intuit.quickbooks.accounting";

const SANDBOX_API_BASE: &str = "https://sandbox-quickbooks.api.intuit.com/v3/company/";
const PRODUCTION_API_BASE: &str = "https://quickbooks.api.intuit.com/v3/company/";

/// Which accounting API host to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development companies.
    #[default]
    Sandbox,
    /// Live companies.
    Production,
}

impl Environment {
    /// Base URL of the company-scoped API, ending in `/`.
    pub fn api_base(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_API_BASE,
            Self::Production => PRODUCTION_API_BASE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "unknown environment '{}', expected 'sandbox' or 'production'",
                other
            )),
        }
    }
}

/// Configuration for an OAuth provider.
///
/// # Example
///
/// ```
/// use ledgerlink_core::provider::ProviderConfig;
///
/// let intuit = ProviderConfig::intuit();
/// assert!(intuit.token_url.starts_with("https://oauth.platform.intuit.com"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Human-readable name.
    pub name: String,

    /// OAuth authorization endpoint URL.
    pub auth_url: String,

    /// OAuth token endpoint URL.
    pub token_url: String,

    /// OAuth scopes to request.
    pub default_scopes: Vec<String>,
}

impl ProviderConfig {
    /// Create a new provider configuration with empty endpoints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth_url: String::new(),
            token_url: String::new(),
            default_scopes: Vec::new(),
        }
    }

    /// The Intuit (QuickBooks Online) provider.
    pub fn intuit() -> Self {
        Self::new("Intuit")
            .with_auth_url(INTUIT_AUTH_URL)
            .with_token_url(INTUIT_TOKEN_URL)
            .with_scopes(vec![ACCOUNTING_SCOPE.to_string()])
    }

    /// Set the authorization URL.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Set the token URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the default scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::intuit()
    }
}
