// Sealing of values written to durable storage (AES-256-GCM)

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Encryption key size for AES-256 (256 bits)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Storage encryption key
pub type StorageKey = [u8; ENCRYPTION_KEY_SIZE];

/// Derive a storage key from a configured secret of any length
#[must_use]
pub fn derive_encryption_key(secret: &[u8]) -> StorageKey {
    Sha256::digest(secret).into()
}

/// Encrypt `plaintext` under `key` with a fresh random nonce
///
/// # Returns
///
/// Base64URL (unpadded) of `nonce || ciphertext`
///
/// # Errors
///
/// Returns an error if AES encryption fails
pub fn seal(plaintext: &[u8], key: &StorageKey) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| anyhow!("AES encryption failed: {e}"))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(sealed))
}

/// Reverse [`seal`]
///
/// # Errors
///
/// Returns an error if:
/// - The input is not valid Base64URL
/// - The input is shorter than a nonce
/// - Authentication fails (wrong key or tampered data)
pub fn open(sealed: &str, key: &StorageKey) -> Result<Vec<u8>> {
    let raw = general_purpose::URL_SAFE_NO_PAD
        .decode(sealed)
        .context("Sealed value is not valid base64")?;
    if raw.len() < NONCE_SIZE {
        return Err(anyhow!("Sealed value too short: {} bytes", raw.len()));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow!("AES decryption failed: {e}"))
}

/// [`open`] a sealed UTF-8 string
///
/// # Errors
///
/// Returns an error if opening fails or the plaintext is not UTF-8
pub fn open_string(sealed: &str, key: &StorageKey) -> Result<String> {
    String::from_utf8(open(sealed, key)?).context("Sealed value is not UTF-8")
}
