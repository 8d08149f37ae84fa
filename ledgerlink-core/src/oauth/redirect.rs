//! Obtaining and parsing the provider redirect.
//!
//! The provider sends the user's browser to the registered redirect URI
//! with `code`, `state` and `realmId` appended. Nothing is guaranteed to be
//! listening there, so the default [`TerminalRedirectResolver`] asks the
//! user to paste the URL from the address bar instead.

use std::collections::HashMap;
use std::process::Command;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use url::Url;

use crate::token::AuthError;

/// Values extracted from a successful redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    /// One-time authorization code.
    pub code: String,

    /// State echoed back by the provider.
    pub state: String,

    /// Company the user connected, if the provider reported it.
    pub realm_id: Option<String>,
}

/// Parse a pasted redirect URL and check it against the expected `state`.
///
/// # Errors
///
/// - [`AuthError::Authorization`] if the input is empty or the provider
///   redirected with an `error` parameter
/// - [`AuthError::InvalidRedirect`] if the URL does not parse, lacks `code`
///   or `state`, or carries a state other than `expected_state`
pub fn parse_redirect(input: &str, expected_state: &str) -> Result<AuthorizationCallback, AuthError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AuthError::Authorization {
            message: "no redirect URL was supplied".to_string(),
        });
    }

    let url = Url::parse(input).map_err(|e| AuthError::InvalidRedirect {
        message: format!("could not parse '{}': {}", input, e),
    })?;

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(|d| format!(" ({})", d))
            .unwrap_or_default();
        return Err(AuthError::Authorization {
            message: format!("provider returned error: {}{}", error, description),
        });
    }

    let code = non_empty(&params, "code").ok_or_else(|| AuthError::InvalidRedirect {
        message: "missing 'code' parameter".to_string(),
    })?;

    let state = non_empty(&params, "state").ok_or_else(|| AuthError::InvalidRedirect {
        message: "missing 'state' parameter".to_string(),
    })?;

    if state != expected_state {
        return Err(AuthError::InvalidRedirect {
            message: "state parameter does not match the authorization request".to_string(),
        });
    }

    Ok(AuthorizationCallback {
        code,
        state,
        realm_id: non_empty(&params, "realmId"),
    })
}

fn non_empty(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.is_empty()).cloned()
}

/// Capability that takes the user through consent and returns the redirect
/// URL the provider produced.
#[async_trait]
pub trait RedirectResolver: Send + Sync {
    /// Present `authorization_url` to the user and return the redirect URL.
    async fn resolve(&self, authorization_url: &Url) -> Result<String, AuthError>;
}

/// Resolver that opens the browser and reads the pasted redirect from stdin.
///
/// Prompts go to stderr so stdout stays clean for command output.
#[derive(Debug, Clone)]
pub struct TerminalRedirectResolver {
    open_browser: bool,
}

impl TerminalRedirectResolver {
    pub fn new() -> Self {
        Self { open_browser: true }
    }

    /// Only print the URL; do not try to launch a browser.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }
}

impl Default for TerminalRedirectResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RedirectResolver for TerminalRedirectResolver {
    async fn resolve(&self, authorization_url: &Url) -> Result<String, AuthError> {
        if self.open_browser {
            if let Err(e) = open_browser(authorization_url.as_str()) {
                tracing::warn!("Could not open a browser: {}", e);
            }
        }

        let prompt = format!(
            "Log in and approve access at:\n\n  {}\n\n\
             After the Connect screen, paste the full redirect URL: ",
            authorization_url
        );

        let prompt_failed = |e: std::io::Error| AuthError::Authorization {
            message: format!("failed to write prompt: {}", e),
        };
        let mut stderr = tokio::io::stderr();
        stderr.write_all(prompt.as_bytes()).await.map_err(prompt_failed)?;
        stderr.flush().await.map_err(prompt_failed)?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| AuthError::Authorization {
                message: format!("failed to read redirect URL: {}", e),
            })?;

        if read == 0 {
            return Err(AuthError::Authorization {
                message: "input closed before a redirect URL was supplied".to_string(),
            });
        }

        Ok(line.trim().to_string())
    }
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        Command::new("cmd").args(["/C", "start", "", url]).spawn()?;
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open").arg(url).spawn()?;
    }

    Ok(())
}
