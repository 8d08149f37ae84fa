//! Ledgerlink CLI
//!
//! Command-line interface for QuickBooks Online authentication and queries.
//!
//! # Usage
//!
//! ```bash
//! # Connect a company (opens the browser, then asks for the redirect URL)
//! ledgerlink login
//!
//! # Print a valid access token, refreshing it if needed
//! ledgerlink token
//!
//! # Run a query and print every matching row
//! ledgerlink query "SELECT Id, Name, QtyOnHand FROM Item" --all
//! ```

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ledgerlink_core::api::MAX_PAGE_SIZE;
use ledgerlink_core::{
    AuthError, CredentialManager, CredentialRecord, CredentialStore, EncryptedFileStore,
    EncryptionKey, QueryClient, TerminalRedirectResolver,
};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "ledgerlink")]
#[command(about = "OAuth credential manager and query tool for QuickBooks Online")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ./ledgerlink.toml, then the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a company through the browser consent screen
    Login {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Print an access token valid for immediate use
    Token {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the stored credentials without contacting the provider
    Status,

    /// Delete stored credentials
    Logout,

    /// Run a query against the accounting API
    Query {
        /// Query statement, e.g. "SELECT * FROM Invoice"
        statement: String,

        /// Fetch every page instead of just the first
        #[arg(short, long)]
        all: bool,

        /// Rows per page when fetching every page
        #[arg(long, default_value_t = MAX_PAGE_SIZE)]
        page_size: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e
                .downcast_ref::<AuthError>()
                .is_some_and(AuthError::requires_new_login)
            {
                eprintln!();
                eprintln!("The stored credentials can no longer be used.");
                eprintln!("Run `ledgerlink logout`, then `ledgerlink login` to connect again.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = &settings.config_path {
        debug!("Loaded configuration from {:?}", path);
    }

    match cli.command {
        Commands::Login { no_browser } => login(&settings, no_browser).await,
        Commands::Token { format } => print_token(&settings, format).await,
        Commands::Status => status(&settings).await,
        Commands::Logout => logout(&settings).await,
        Commands::Query {
            statement,
            all,
            page_size,
        } => query(&settings, &statement, all, page_size).await,
    }
}

async fn open_manager(
    settings: &Settings,
    open_browser: bool,
) -> Result<CredentialManager<EncryptedFileStore, TerminalRedirectResolver>> {
    let config = settings.credential_config()?;
    let store = EncryptedFileStore::provision(&config.store)
        .await
        .map_err(AuthError::from)?;

    let resolver = if open_browser {
        TerminalRedirectResolver::new()
    } else {
        TerminalRedirectResolver::new().without_browser()
    };

    Ok(CredentialManager::new(config, store, resolver)?)
}

async fn login(settings: &Settings, no_browser: bool) -> Result<()> {
    let manager = open_manager(settings, !no_browser).await?;
    let record = manager.authorize().await?;

    println!("Connected.");
    println!(
        "  Company:     {}",
        record.realm_id.as_deref().unwrap_or("(not reported)")
    );
    println!("  Environment: {}", settings.environment);
    println!("  Valid until: {}", record.expires_at.to_rfc3339());
    Ok(())
}

async fn print_token(settings: &Settings, format: OutputFormat) -> Result<()> {
    let manager = open_manager(settings, true).await?;
    let record = manager.get_valid_credentials().await?;

    match format {
        OutputFormat::Text => println!("{}", record.access_token.expose()),
        OutputFormat::Json => {
            let out = json!({
                "access_token": record.access_token.expose(),
                "expires_at": record.expires_at.to_rfc3339(),
                "realm_id": record.realm_id,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

async fn status(settings: &Settings) -> Result<()> {
    let Some(record) = stored_record(settings).await? else {
        println!("Not logged in.");
        return Ok(());
    };

    let margin = chrono::Duration::seconds(settings.expiry_margin_secs);
    let state = if record.is_expired() {
        "expired (will refresh on next use)"
    } else if record.expires_within(margin) {
        "expiring (will refresh on next use)"
    } else {
        "valid"
    };

    println!("Logged in.");
    println!(
        "  Company:      {}",
        record.realm_id.as_deref().unwrap_or("(not reported)")
    );
    println!("  Environment:  {}", settings.environment);
    println!("  Access token: {}", state);
    println!("  Expires at:   {}", record.expires_at.to_rfc3339());
    println!("  Refreshed at: {}", record.refreshed_at.to_rfc3339());
    if record.expires_at > Utc::now() {
        let remaining = record.expires_at - Utc::now();
        println!("  Remaining:    {}m {}s", remaining.num_minutes(), remaining.num_seconds() % 60);
    }
    Ok(())
}

/// Read the stored record without provisioning a key.
async fn stored_record(settings: &Settings) -> Result<Option<CredentialRecord>> {
    let Some(key) = EncryptionKey::load(&settings.key_path)
        .await
        .map_err(AuthError::from)?
    else {
        return Ok(None);
    };

    let store = EncryptedFileStore::new(&settings.credential_path, key);
    Ok(store.load().await.map_err(AuthError::from)?)
}

async fn logout(settings: &Settings) -> Result<()> {
    // Clearing never touches the key, so any key will do here.
    let store = EncryptedFileStore::new(
        &settings.credential_path,
        EncryptionKey::generate().map_err(AuthError::from)?,
    );
    store.clear().await.map_err(AuthError::from)?;

    // An unreadable key file would block the next login.
    if EncryptionKey::load(&settings.key_path).await.is_err() {
        tokio::fs::remove_file(&settings.key_path)
            .await
            .with_context(|| format!("Failed to remove key file {:?}", settings.key_path))?;
        info!("Removed unreadable key file {:?}", settings.key_path);
    }

    println!("Logged out.");
    Ok(())
}

async fn query(settings: &Settings, statement: &str, all: bool, page_size: u32) -> Result<()> {
    let manager = open_manager(settings, true).await?;
    let record = manager.get_valid_credentials().await?;

    let Some(realm_id) = record.realm_id.as_deref() else {
        bail!("no company id is stored; run `ledgerlink login` to connect a company");
    };

    let client = QueryClient::new(settings.environment, settings.minor_version)?;
    let page = if all {
        client
            .query_all(&record.access_token, realm_id, statement, page_size)
            .await?
    } else {
        client.query(&record.access_token, realm_id, statement).await?
    };

    info!(rows = page.rows.len(), "Query complete");
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
