//! Symmetric key material for sealing session state at rest.
//!
//! Keys are derived from the configured secret with Blake3 in key-derivation
//! mode; payloads are sealed with ChaCha20-Poly1305.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::error::{CoreError, Result};

/// Blake3 derive-key context. Changing it invalidates every stored session.
const KEY_CONTEXT: &str = "punchcard 2024 session-store encryption key v1";

/// Length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;

/// Length of the ChaCha20-Poly1305 nonce.
pub const NONCE_LEN: usize = 12;

/// Derive the session sealing key from the configured secret.
///
/// Returns `None` when no secret is configured (or it is all whitespace).
/// Callers must then store session state unsealed rather than fail. Any other
/// secret is used byte for byte, surrounding whitespace included.
pub fn derive_key(secret: Option<&str>) -> Option<SealKey> {
    let secret = secret.filter(|s| !s.trim().is_empty())?;
    Some(SealKey(blake3::derive_key(KEY_CONTEXT, secret.as_bytes())))
}

/// A 256-bit symmetric key for ChaCha20-Poly1305.
#[derive(Clone)]
pub struct SealKey([u8; 32]);

impl SealKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt, returning the ciphertext and its detached tag.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &SealNonce) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        let mut sealed = cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        // The AEAD output is ciphertext || tag.
        let split = sealed.len() - TAG_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&sealed[split..]);
        sealed.truncate(split);
        Ok((sealed, tag))
    }

    /// Decrypt a ciphertext with its detached tag.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        tag: &[u8; TAG_LEN],
        nonce: &SealNonce,
    ) -> Result<Vec<u8>> {
        let cipher =
            ChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| CoreError::DecryptionFailed)?;

        let mut joined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        joined.extend_from_slice(ciphertext);
        joined.extend_from_slice(tag);

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), joined.as_slice())
            .map_err(|_| CoreError::DecryptionFailed)
    }
}

impl std::fmt::Debug for SealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealKey(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305. Never reused under one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealNonce(pub [u8; NONCE_LEN]);

impl SealNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_secret_means_no_key() {
        assert!(derive_key(None).is_none());
        assert!(derive_key(Some("")).is_none());
        assert!(derive_key(Some("   ")).is_none());
    }

    #[test]
    fn test_key_derivation_deterministic() {
        let k1 = derive_key(Some("hunter2")).unwrap();
        let k2 = derive_key(Some("hunter2")).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_key_derivation_different_secrets() {
        let k1 = derive_key(Some("secret-a")).unwrap();
        let k2 = derive_key(Some("secret-b")).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_key_derivation_keeps_whitespace() {
        let bare = derive_key(Some("k")).unwrap();
        let padded = derive_key(Some(" k")).unwrap();
        let trailing = derive_key(Some("k\n")).unwrap();
        assert_ne!(bare.as_bytes(), padded.as_bytes());
        assert_ne!(bare.as_bytes(), trailing.as_bytes());
    }

    #[test]
    fn test_key_is_not_the_secret() {
        let secret = "0123456789abcdef0123456789abcdef";
        let key = derive_key(Some(secret)).unwrap();
        assert_ne!(key.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = SealKey::generate();
        let nonce = SealNonce::generate();
        let plaintext = b"hello, world!";

        let (ciphertext, tag) = key.encrypt(plaintext, &nonce).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(ciphertext, plaintext);

        let decrypted = key.decrypt(&ciphertext, &tag, &nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = SealKey::generate();
        let key2 = SealKey::generate();
        let nonce = SealNonce::generate();

        let (ciphertext, tag) = key1.encrypt(b"secret", &nonce).unwrap();
        assert!(matches!(
            key2.decrypt(&ciphertext, &tag, &nonce),
            Err(CoreError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_decrypt_tampered_tag_fails() {
        let key = SealKey::generate();
        let nonce = SealNonce::generate();

        let (ciphertext, mut tag) = key.encrypt(b"secret", &nonce).unwrap();
        tag[0] ^= 0x01;
        assert!(key.decrypt(&ciphertext, &tag, &nonce).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let key = SealKey::from_bytes([0x42; 32]);
        assert_eq!(format!("{:?}", key), "SealKey(..)");
    }
}
