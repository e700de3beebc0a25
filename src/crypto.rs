//! Scratch-code protection primitives.
//!
//! Codes are stored encrypted (ChaCha20-Poly1305, random nonce prefixed to
//! the ciphertext, base64 encoded) alongside a deterministic SHA-256 hash.
//! The hash is what duplicate detection compares; the plaintext never leaves
//! this module except through [`decrypt_code`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from encrypting or decrypting a scratch code
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),
}

const NONCE_LEN: usize = 12;

/// Deterministic one-way hash of a scratch code, hex encoded.
///
/// Callers must pass the normalized (trimmed, uppercased) code so that the
/// same code always produces the same hash.
pub fn hash_code(normalized_code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Encrypt a scratch code for storage at rest.
pub fn encrypt_code(key: &[u8; 32], plaintext: &str) -> Result<String, CryptoError> {
    let cipher = ChaCha20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    // Prepend the nonce to the ciphertext for use in decryption.
    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(blob))
}

/// Decrypt a stored scratch code.
pub fn decrypt_code(key: &[u8; 32], encoded: &str) -> Result<String, CryptoError> {
    let blob = BASE64
        .decode(encoded)
        .map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))?;

    if blob.len() < NONCE_LEN {
        return Err(CryptoError::MalformedCiphertext(
            "ciphertext shorter than nonce".to_string(),
        ));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(key.into());
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_code("GC-1234-ABCD"), hash_code("GC-1234-ABCD"));
        assert_ne!(hash_code("GC-1234-ABCD"), hash_code("GC-1234-ABCE"));
    }

    #[test]
    fn test_encrypt_roundtrip() {
        let encrypted = encrypt_code(&KEY, "GC-1234-ABCD").unwrap();
        assert_ne!(encrypted, "GC-1234-ABCD");
        assert_eq!(decrypt_code(&KEY, &encrypted).unwrap(), "GC-1234-ABCD");
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let a = encrypt_code(&KEY, "GC-1234-ABCD").unwrap();
        let b = encrypt_code(&KEY, "GC-1234-ABCD").unwrap();
        assert_ne!(a, b, "each encryption must use a fresh nonce");
    }

    #[test]
    fn test_decrypt_rejects_wrong_key() {
        let encrypted = encrypt_code(&KEY, "GC-1234-ABCD").unwrap();
        let other_key = [8u8; 32];
        assert!(decrypt_code(&other_key, &encrypted).is_err());
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        assert!(decrypt_code(&KEY, "not base64 !!!").is_err());
        assert!(decrypt_code(&KEY, "AAAA").is_err());
    }
}
