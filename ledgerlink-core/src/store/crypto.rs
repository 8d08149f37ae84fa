//! AES-256-GCM sealing of credential records using `ring`.
//!
//! Every call to [`seal`] draws a fresh random 96-bit nonce. The returned
//! ciphertext carries the 128-bit authentication tag, so any modification
//! of nonce, ciphertext or key makes [`open`] fail.

use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

use super::StoreError;

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

/// Yields exactly one nonce, then errors.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

/// Encrypt `plaintext` under `key`, returning `(nonce, ciphertext || tag)`.
pub fn seal(
    plaintext: &[u8],
    key: &[u8; KEY_LEN],
) -> Result<([u8; NONCE_LEN_BYTES], Vec<u8>), StoreError> {
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| StoreError::Crypto {
            message: "failed to generate random nonce".into(),
        })?;

    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| StoreError::Crypto {
        message: "failed to create AES-256-GCM key".into(),
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce(Some(nonce)));

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| StoreError::Crypto {
            message: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "sealed credential record"
    );

    Ok((nonce, in_out))
}

/// Decrypt and authenticate `ciphertext` (tag included).
///
/// Fails with [`StoreError::Corrupt`] if the key is wrong or any byte has
/// been altered.
pub fn open(
    nonce: &[u8; NONCE_LEN_BYTES],
    ciphertext: &[u8],
    key: &[u8; KEY_LEN],
) -> Result<Vec<u8>, StoreError> {
    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| StoreError::Crypto {
        message: "failed to create AES-256-GCM key".into(),
    })?;
    let mut opening_key = OpeningKey::new(unbound, SingleNonce(Some(*nonce)));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| StoreError::corrupt("authentication failed: wrong key or altered data"))?;

    Ok(plaintext.to_vec())
}

/// Fill a fresh key buffer from the system CSPRNG.
pub fn random_key() -> Result<[u8; KEY_LEN], StoreError> {
    let mut key = [0u8; KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| StoreError::Crypto {
            message: "failed to generate random key".into(),
        })?;
    Ok(key)
}
