//! Key wrapping: AES-256-GCM over the raw bytes of one key under another.
//!
//! Unwrapping is the only password check in the system. A failed tag check
//! means the password was wrong or the wrapped key was tampered with, and
//! both surface as the same `UnwrapAuthentication` error.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::aead;
use crate::keys::{SymmetricKey, KEY_LENGTH};
use crate::string::EncryptedString;
use zerokey_common::{Error, Result};

/// A wrapped key in the same `{data, iv}` shape as an encrypted string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedKey(EncryptedString);

impl WrappedKey {
    /// Borrow the underlying `{data, iv}` pair.
    pub fn as_encrypted(&self) -> &EncryptedString {
        &self.0
    }

    /// Serialize to a JSON string for storage.
    pub fn to_json(&self) -> Result<String> {
        self.0.to_json()
    }

    /// Parse a stored JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self(EncryptedString::from_json(json)?))
    }
}

impl From<EncryptedString> for WrappedKey {
    fn from(inner: EncryptedString) -> Self {
        Self(inner)
    }
}

/// Wraps and unwraps symmetric keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyWrapping;

impl KeyWrapping {
    /// Create the wrapping component.
    pub fn new() -> Self {
        Self
    }

    /// Wrap `key` under `wrapping_key` with a fresh IV.
    pub fn wrap_key<K, W>(&self, key: &K, wrapping_key: &W) -> Result<WrappedKey>
    where
        K: SymmetricKey,
        W: SymmetricKey,
    {
        let (ciphertext, iv) = aead::encrypt(wrapping_key.as_bytes(), key.as_bytes())?;
        Ok(WrappedKey(EncryptedString::from_parts(&ciphertext, &iv)))
    }

    /// Unwrap a key.
    ///
    /// # Errors
    /// - `UnwrapAuthentication` for a wrong unwrapping key or any corruption
    ///   of the wrapped form; never returns a corrupt key
    pub fn unwrap_key<K, W>(&self, wrapped: &WrappedKey, unwrapping_key: &W) -> Result<K>
    where
        K: SymmetricKey,
        W: SymmetricKey,
    {
        let (ciphertext, iv) = wrapped
            .0
            .to_parts()
            .map_err(|_| Error::UnwrapAuthentication)?;

        let mut plaintext = aead::decrypt(unwrapping_key.as_bytes(), &iv, &ciphertext)
            .map_err(|_| Error::UnwrapAuthentication)?;

        if plaintext.len() != KEY_LENGTH {
            plaintext.zeroize();
            return Err(Error::UnwrapAuthentication);
        }

        let mut key_bytes = [0u8; KEY_LENGTH];
        key_bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();

        let key = K::from_bytes(key_bytes);
        key_bytes.zeroize();
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{derive_key, KdfParams};
    use crate::keys::{FileKey, MasterKey, PasswordKey, Salt};

    fn password_key(password: &[u8]) -> PasswordKey {
        derive_key(password, &Salt::from_bytes([3u8; 32]), &KdfParams::testing()).unwrap()
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let wrapping = KeyWrapping::new();
        let master = MasterKey::generate().unwrap();
        let pk = password_key(b"correct");

        let wrapped = wrapping.wrap_key(&master, &pk).unwrap();
        let unwrapped: MasterKey = wrapping.unwrap_key(&wrapped, &pk).unwrap();

        assert_eq!(unwrapped.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_wrong_password_key_fails() {
        let wrapping = KeyWrapping::new();
        let master = MasterKey::generate().unwrap();

        let wrapped = wrapping.wrap_key(&master, &password_key(b"correct")).unwrap();
        let result: Result<MasterKey> = wrapping.unwrap_key(&wrapped, &password_key(b"wrong"));

        assert!(matches!(result, Err(Error::UnwrapAuthentication)));
    }

    #[test]
    fn test_tampered_wrapped_key_fails() {
        let wrapping = KeyWrapping::new();
        let master = MasterKey::generate().unwrap();
        let pk = password_key(b"correct");

        let wrapped = wrapping.wrap_key(&master, &pk).unwrap();
        let mut raw = crate::encoding::decode(&wrapped.as_encrypted().data).unwrap();
        raw[KEY_LENGTH - 1] ^= 0x80;
        let tampered = WrappedKey::from(EncryptedString {
            data: crate::encoding::encode(&raw),
            iv: wrapped.as_encrypted().iv.clone(),
        });

        let result: Result<MasterKey> = wrapping.unwrap_key(&tampered, &pk);
        assert!(matches!(result, Err(Error::UnwrapAuthentication)));
    }

    #[test]
    fn test_malformed_wrapped_key_fails_the_same_way() {
        let wrapped = WrappedKey::from(EncryptedString {
            data: "!!".to_string(),
            iv: "??".to_string(),
        });
        let result: Result<MasterKey> = KeyWrapping::new().unwrap_key(&wrapped, &password_key(b"x"));
        assert!(matches!(result, Err(Error::UnwrapAuthentication)));
    }

    #[test]
    fn test_wrong_length_payload_rejected() {
        // A 16-byte secret sealed under the right key is still not a key.
        let pk = password_key(b"correct");
        let (ct, iv) = aead::encrypt(pk.as_bytes(), &[0u8; 16]).unwrap();
        let wrapped = WrappedKey::from(EncryptedString::from_parts(&ct, &iv));

        let result: Result<FileKey> = KeyWrapping::new().unwrap_key(&wrapped, &pk);
        assert!(matches!(result, Err(Error::UnwrapAuthentication)));
    }

    #[test]
    fn test_fresh_iv_per_wrap() {
        let wrapping = KeyWrapping::new();
        let master = MasterKey::generate().unwrap();
        let pk = password_key(b"correct");

        let a = wrapping.wrap_key(&master, &pk).unwrap();
        let b = wrapping.wrap_key(&master, &pk).unwrap();
        assert_ne!(a.as_encrypted().iv, b.as_encrypted().iv);
    }

    #[test]
    fn test_json_roundtrip() {
        let wrapped = KeyWrapping::new()
            .wrap_key(&MasterKey::generate().unwrap(), &password_key(b"pw"))
            .unwrap();
        let json = wrapped.to_json().unwrap();
        assert!(json.contains("\"data\""));
        assert_eq!(WrappedKey::from_json(&json).unwrap(), wrapped);
    }
}
