//! AES-256-GCM cryptographer
//!
//! A fresh random 96-bit nonce is generated per encryption and carried in
//! the payload next to the ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;

use crate::crypto::{CryptoError, Cryptographer, EncryptedPayload, KeyMaterial};

const ALGORITHM: &str = "AES-256-GCM";
const NONCE_LENGTH: usize = 12;

#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCryptographer;

impl AesGcmCryptographer {
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &KeyMaterial) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
    }
}

impl Cryptographer for AesGcmCryptographer {
    fn algorithm(&self) -> &str {
        ALGORITHM
    }

    fn encrypt(&self, key: &KeyMaterial, plaintext: &[u8]) -> Result<EncryptedPayload, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = Self::cipher(key)
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        Ok(EncryptedPayload::new(ALGORITHM, &nonce_bytes, &ciphertext))
    }

    fn decrypt(&self, key: &KeyMaterial, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
        if payload.algorithm != ALGORITHM {
            return Err(CryptoError::Decrypt(format!(
                "unsupported algorithm {}",
                payload.algorithm
            )));
        }

        let nonce_bytes = payload.nonce_bytes()?;
        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(CryptoError::Decrypt("invalid nonce length".to_string()));
        }
        let ciphertext = payload.ciphertext_bytes()?;

        Self::cipher(key)
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}
