//! String encryption for file and folder names.
//!
//! Output is a JSON-friendly `{ "data": <base64>, "iv": <base64> }` pair.

use serde::{Deserialize, Serialize};

use crate::aead::{self, Nonce};
use crate::encoding;
use crate::keys::ContentKey;
use zerokey_common::{Error, Result};

/// A base64 ciphertext and the base64 IV it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedString {
    /// Ciphertext with appended tag.
    pub data: String,
    /// 96-bit IV.
    pub iv: String,
}

impl EncryptedString {
    pub(crate) fn from_parts(ciphertext: &[u8], iv: &Nonce) -> Self {
        Self {
            data: encoding::encode(ciphertext),
            iv: encoding::encode(iv),
        }
    }

    /// Decode both fields. Malformed encodings count as corruption.
    pub(crate) fn to_parts(&self) -> Result<(Vec<u8>, Nonce)> {
        let ciphertext = encoding::decode(&self.data).map_err(|_| Error::Decryption)?;
        let iv = encoding::decode_array(&self.iv).map_err(|_| Error::Decryption)?;
        Ok((ciphertext, iv))
    }

    /// Serialize to a JSON string for storage.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// AES-256-GCM cipher for short UTF-8 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCipher;

impl StringCipher {
    /// Create the cipher.
    pub fn new() -> Self {
        Self
    }

    /// Encrypt a string under a fresh IV.
    pub fn encrypt<K: ContentKey>(&self, plaintext: &str, key: &K) -> Result<EncryptedString> {
        let (ciphertext, iv) = aead::encrypt(key.as_bytes(), plaintext.as_bytes())?;
        Ok(EncryptedString::from_parts(&ciphertext, &iv))
    }

    /// Decrypt a string.
    ///
    /// # Errors
    /// - `Decryption` for a wrong key, tampered or malformed fields, or a
    ///   plaintext that is not UTF-8
    pub fn decrypt<K: ContentKey>(&self, encrypted: &EncryptedString, key: &K) -> Result<String> {
        let (ciphertext, iv) = encrypted.to_parts()?;
        let plaintext = aead::decrypt(key.as_bytes(), &iv, &ciphertext)?;
        String::from_utf8(plaintext).map_err(|_| Error::Decryption)
    }
}
