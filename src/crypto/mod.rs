//! Cryptography Module
//!
//! The cryptography provider consumed by the encrypting store, the key
//! material it is keyed with, and the payload format it produces.

mod aes;

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

pub use aes::AesGcmCryptographer;

/// Length of symmetric key material in bytes.
pub const KEY_LENGTH: usize = 32;

// == Crypto Error ==
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Invalid payload encoding: {0}")]
    Encoding(String),
}

// == Key Material ==
/// Symmetric key bytes, wiped from memory on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: Zeroizing<[u8; KEY_LENGTH]>,
}

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Decodes standard base64 key material.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        let bytes: [u8; KEY_LENGTH] = decoded.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LENGTH,
                decoded.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Generates fresh random key material.
    pub fn generate() -> Self {
        use rand::RngCore;

        let mut bytes = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.bytes
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

// == Encrypted Payload ==
/// Ciphertext plus the metadata needed to decrypt it.
///
/// Binary fields are base64 so the payload can pass through any text
/// serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Algorithm identifier, e.g. `AES-256-GCM`
    pub algorithm: String,
    /// Base64 nonce/IV
    pub nonce: String,
    /// Base64 ciphertext including the authentication tag
    pub value: String,
}

impl EncryptedPayload {
    pub fn new(algorithm: impl Into<String>, nonce: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            algorithm: algorithm.into(),
            nonce: STANDARD.encode(nonce),
            value: STANDARD.encode(ciphertext),
        }
    }

    pub fn nonce_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        STANDARD
            .decode(&self.nonce)
            .map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        STANDARD
            .decode(&self.value)
            .map_err(|e| CryptoError::Encoding(e.to_string()))
    }
}

// == Cryptographer ==
/// Symmetric encryption provider. Both operations are synchronous and
/// side-effect free apart from nonce generation.
pub trait Cryptographer: Send + Sync {
    fn algorithm(&self) -> &str;

    fn encrypt(&self, key: &KeyMaterial, plaintext: &[u8]) -> Result<EncryptedPayload, CryptoError>;

    fn decrypt(&self, key: &KeyMaterial, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError>;
}
