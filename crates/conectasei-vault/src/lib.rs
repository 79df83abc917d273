//! Credential Vault: symmetric authenticated encryption for per-tenant
//! upstream credentials.
//!
//! Plaintext exists only inside the pipeline process, only for the
//! duration of a single extraction or download invocation. Ciphertext is
//! what gets persisted in `tenants.encrypted_credentials`; it is opaque to
//! every other component.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use conectasei_types::secrets::{SecretString, TenantCredentials};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("symmetric encryption key must decode to 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("encryption key is not valid base64: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: ciphertext may be corrupt or the key has rotated")]
    Decrypt,

    #[error("ciphertext shorter than the nonce prefix")]
    Truncated,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct CredentialsPayload {
    email: String,
    password: String,
}

/// Symmetric authenticated encryption over a single process-global key.
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// `key_base64` is the base64-encoded 32-byte key from
    /// `SYMMETRIC_ENCRYPTION_KEY`.
    pub fn new(key_base64: &str) -> Result<Self, VaultError> {
        let key_bytes = base64::engine::general_purpose::STANDARD.decode(key_base64)?;
        if key_bytes.len() != 32 {
            return Err(VaultError::InvalidKeyLength(key_bytes.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt a plaintext byte string. Output is `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| VaultError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a `nonce || ciphertext` blob produced by [`encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, VaultError> {
        if blob.len() < NONCE_LEN {
            return Err(VaultError::Truncated);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::Decrypt)
    }

    /// Encrypt a tenant's upstream email/password pair for storage in
    /// `tenants.encrypted_credentials`.
    pub fn encrypt_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Vec<u8>, VaultError> {
        let payload = CredentialsPayload {
            email: email.to_string(),
            password: password.to_string(),
        };
        let json = serde_json::to_vec(&payload)?;
        self.encrypt(&json)
    }

    /// Decrypt a stored blob into in-memory credentials. Never logged: the
    /// values are wrapped in [`SecretString`] immediately.
    pub fn decrypt_credentials(&self, blob: &[u8]) -> Result<TenantCredentials, VaultError> {
        let plaintext = self.decrypt(blob)?;
        let payload: CredentialsPayload = serde_json::from_slice(&plaintext)?;
        Ok(TenantCredentials {
            email: SecretString::new(payload.email),
            password: SecretString::new(payload.password),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> CredentialVault {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        CredentialVault::new(&key).unwrap()
    }

    #[test]
    fn round_trips_credentials() {
        let vault = test_vault();
        let encrypted = vault
            .encrypt_credentials("user@tribunal.gov", "s3cret!")
            .unwrap();
        let decrypted = vault.decrypt_credentials(&encrypted).unwrap();
        assert_eq!(decrypted.email.expose_secret(), "user@tribunal.gov");
        assert_eq!(decrypted.password.expose_secret(), "s3cret!");
    }

    #[test]
    fn distinct_ciphertexts_for_same_plaintext() {
        let vault = test_vault();
        let a = vault.encrypt_credentials("a", "b").unwrap();
        let b = vault.encrypt_credentials("a", "b").unwrap();
        assert_ne!(a, b, "nonce must be fresh per call");
    }

    #[test]
    fn rejects_short_keys() {
        let key = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(matches!(
            CredentialVault::new(&key),
            Err(VaultError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let vault = test_vault();
        let mut encrypted = vault.encrypt_credentials("a", "b").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xFF;
        assert!(vault.decrypt_credentials(&encrypted).is_err());
    }
}
