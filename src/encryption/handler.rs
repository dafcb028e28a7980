//! Sealing handler: encrypts and decrypts document parts with the file key.
//!
//! Each part is serialized with serde_json and encrypted with AES-256-CBC.
//! A random 16-byte IV is prepended to the ciphertext.

use super::aes;
use super::algorithms::{self, FILE_KEY_LEN};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Handler for sealing and opening document parts.
pub struct SealingHandler {
    /// The file encryption key
    file_key: Vec<u8>,
}

impl std::fmt::Debug for SealingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingHandler").finish_non_exhaustive()
    }
}

impl SealingHandler {
    /// Create a handler from a 32-byte file key.
    pub fn from_key(file_key: Vec<u8>) -> Result<Self> {
        if file_key.len() != FILE_KEY_LEN {
            return Err(Error::Encryption(format!(
                "File key must be {} bytes, got {}",
                FILE_KEY_LEN,
                file_key.len()
            )));
        }
        Ok(Self { file_key })
    }

    /// Serialize and encrypt a value.
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(value)?;
        let iv = algorithms::random_bytes(16);
        let ciphertext = aes::aes256_encrypt(&self.file_key, &iv, &plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        // Prepend IV to ciphertext
        let mut result = iv;
        result.extend(ciphertext);
        Ok(result)
    }

    /// Decrypt and deserialize a value sealed with the same key.
    pub fn open<T: DeserializeOwned>(&self, sealed: &[u8]) -> Result<T> {
        if sealed.len() < 32 {
            return Err(Error::InvalidPdf("Sealed part is truncated".to_string()));
        }
        let (iv, ciphertext) = sealed.split_at(16);
        let plaintext = aes::aes256_decrypt(&self.file_key, iv, ciphertext)
            .map_err(|e| Error::InvalidPdf(format!("Sealed part cannot be decrypted: {}", e)))?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
