//! Mnemonic-at-rest decryption.
//!
//! The pool unit only depends on [`SecretDecryptor`]. [`AesGcmEnvelope`] is the bundled
//! implementation: AES-256-GCM with the blob laid out as `nonce(12) ‖ ciphertext ‖ tag`.
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::core::errors::WalletError;
use crate::security::{vec_to_secret, SecretBuffer, SecretVec};

pub const ENCRYPTION_KEY_ENV: &str = "WALLET_ENC_KEY";
const NONCE_LEN: usize = 12;

#[async_trait]
pub trait SecretDecryptor: Send + Sync {
    /// Decrypts an encrypted mnemonic blob into raw mnemonic bytes.
    async fn decrypt(&self, encrypted: &[u8]) -> Result<SecretVec, WalletError>;
}

pub struct AesGcmEnvelope {
    key: SecretBuffer<32>,
}

impl AesGcmEnvelope {
    pub fn new(key: SecretBuffer<32>) -> Self {
        Self { key }
    }

    /// Reads a base64 encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, WalletError> {
        let raw = vec_to_secret(
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| WalletError::ConfigError(format!("invalid envelope key: {}", e)))?,
        );
        let key = SecretBuffer::from_slice(&raw).ok_or_else(|| {
            WalletError::ConfigError(format!("envelope key must be 32 bytes, got {}", raw.len()))
        })?;
        Ok(Self::new(key))
    }

    pub fn from_env() -> Result<Self, WalletError> {
        let encoded = std::env::var(ENCRYPTION_KEY_ENV)
            .map_err(|_| WalletError::ConfigError(format!("{} is not set", ENCRYPTION_KEY_ENV)))?;
        Self::from_base64(&encoded)
    }

    fn cipher(&self) -> Result<Aes256Gcm, WalletError> {
        self.key
            .with_secret(|k| Aes256Gcm::new_from_slice(k))
            .map_err(|e| WalletError::InternalError(e.to_string()))
    }

    /// Encrypts a mnemonic for storage. Used when provisioning wallet records.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| WalletError::InternalError("mnemonic encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn open(&self, blob: &[u8]) -> Result<SecretVec, WalletError> {
        if blob.len() <= NONCE_LEN {
            return Err(WalletError::DecryptionFailed("encrypted blob is truncated".to_string()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(vec_to_secret)
            .map_err(|_| WalletError::DecryptionFailed("authentication tag mismatch".to_string()))
    }
}

#[async_trait]
impl SecretDecryptor for AesGcmEnvelope {
    async fn decrypt(&self, encrypted: &[u8]) -> Result<SecretVec, WalletError> {
        self.open(encrypted)
    }
}
