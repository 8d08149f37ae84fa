//! Integration tests for the encrypted credential store as seen through the
//! manager: persistence across runs, corruption, and key loss.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ledgerlink_core::{
    AuthError, CredentialConfig, CredentialManager, CredentialRecord, CredentialStore,
    EncryptedFileStore, EncryptionKey, KeyProvisioning, RedirectResolver, StorePaths,
};
use tempfile::TempDir;
use url::Url;

/// Resolver for runs where the user never answers.
struct Unattended;

#[async_trait]
impl RedirectResolver for Unattended {
    async fn resolve(&self, _authorization_url: &Url) -> Result<String, AuthError> {
        Err(AuthError::Authorization {
            message: "no user present".to_string(),
        })
    }
}

fn config(dir: &TempDir) -> CredentialConfig {
    CredentialConfig::new("test-client-id", "test-client-secret")
        .with_store_paths(StorePaths::in_dir(dir.path()))
}

async fn open_manager(dir: &TempDir) -> CredentialManager<EncryptedFileStore, Unattended> {
    let config = config(dir);
    let store = EncryptedFileStore::provision(&config.store).await.unwrap();
    CredentialManager::new(config, store, Unattended).unwrap()
}

fn valid_record() -> CredentialRecord {
    CredentialRecord::new(
        "stored-access-token",
        "stored-refresh-token",
        Utc::now() + Duration::hours(1),
    )
    .with_realm_id("4620816365")
}

#[tokio::test]
async fn test_record_survives_a_new_process() {
    let dir = TempDir::new().unwrap();

    let first = open_manager(&dir).await;
    first.store().save(&valid_record()).await.unwrap();
    drop(first);

    // A later run reads the same key file and decrypts the record
    let second = open_manager(&dir).await;
    let token = second.get_valid_token().await.unwrap();

    assert_eq!(token.expose(), "stored-access-token");
}

#[tokio::test]
async fn test_key_file_provisioned_once() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("encrypt.key");

    let (_, first) = EncryptionKey::provision(&key_path).await.unwrap();
    let written = std::fs::read_to_string(&key_path).unwrap();
    let (_, second) = EncryptionKey::provision(&key_path).await.unwrap();

    assert_eq!(first, KeyProvisioning::Generated);
    assert_eq!(second, KeyProvisioning::Loaded);
    assert_eq!(std::fs::read_to_string(&key_path).unwrap(), written);
}

#[tokio::test]
async fn test_tampered_file_is_corrupt_store() {
    let dir = TempDir::new().unwrap();
    let manager = open_manager(&dir).await;
    manager.store().save(&valid_record()).await.unwrap();

    // Flip one character of the ciphertext
    let path = dir.path().join("qbo_tokens.json");
    let contents = std::fs::read_to_string(&path).unwrap();
    let mut envelope: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let ciphertext = envelope["ciphertext"].as_str().unwrap().to_string();
    let flipped = if ciphertext.starts_with('A') { "B" } else { "A" };
    envelope["ciphertext"] = serde_json::Value::String(format!("{}{}", flipped, &ciphertext[1..]));
    std::fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

    let result = manager.get_valid_token().await;

    match result {
        Err(e @ AuthError::CorruptCredentialStore { .. }) => assert!(e.requires_new_login()),
        other => panic!("expected CorruptCredentialStore, got {:?}", other),
    }

    // The damaged file is left for the user to remove
    assert!(path.exists());
}

#[tokio::test]
async fn test_garbage_file_is_corrupt_store() {
    let dir = TempDir::new().unwrap();
    let manager = open_manager(&dir).await;
    std::fs::write(dir.path().join("qbo_tokens.json"), b"not json at all").unwrap();

    let result = manager.get_valid_token().await;

    assert!(matches!(result, Err(AuthError::CorruptCredentialStore { .. })));
}

#[tokio::test]
async fn test_foreign_key_is_corrupt_store() {
    let dir = TempDir::new().unwrap();
    let manager = open_manager(&dir).await;
    manager.store().save(&valid_record()).await.unwrap();

    // Replace the key file with a different, valid key
    let other = EncryptionKey::generate().unwrap();
    std::fs::write(dir.path().join("encrypt.key"), other.to_base64().as_bytes()).unwrap();

    let reopened = open_manager(&dir).await;
    let result = reopened.get_valid_token().await;

    assert!(matches!(result, Err(AuthError::CorruptCredentialStore { .. })));
}

#[tokio::test]
async fn test_lost_key_discards_stale_credentials() {
    let dir = TempDir::new().unwrap();
    let manager = open_manager(&dir).await;
    manager.store().save(&valid_record()).await.unwrap();
    drop(manager);

    std::fs::remove_file(dir.path().join("encrypt.key")).unwrap();

    // Provisioning generates a fresh key; the old file can never be read
    let reopened = open_manager(&dir).await;

    assert!(!dir.path().join("qbo_tokens.json").exists());
    assert!(reopened.current().await.unwrap().is_none());

    // With no record the manager falls back to the interactive flow
    let result = reopened.get_valid_token().await;
    assert!(matches!(result, Err(AuthError::Authorization { .. })));
}

#[tokio::test]
async fn test_malformed_key_file_is_corrupt_store() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("encrypt.key"), b"definitely-not-a-key").unwrap();

    let result = EncryptedFileStore::provision(&config(&dir).store).await;

    let err: AuthError = result.unwrap_err().into();
    assert!(matches!(err, AuthError::CorruptCredentialStore { .. }));
}
