//! Key types with secure memory handling.
//!
//! All symmetric key types zeroize their memory on drop. The type of a key
//! encodes what it may be used for: every key can wrap and unwrap other
//! keys ([`SymmetricKey`]), but only keys implementing [`ContentKey`] may
//! encrypt file contents and names. A [`PasswordKey`] is deliberately not a
//! content key.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding;
use crate::random::random_array;
use zerokey_common::Result;

/// Length of symmetric keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of key-derivation salts in bytes.
pub const SALT_LENGTH: usize = 32;

/// A raw 256-bit symmetric key usable for wrap and unwrap.
pub trait SymmetricKey: Sized {
    /// Build the key from raw bytes.
    fn from_bytes(key: [u8; KEY_LENGTH]) -> Self;

    /// Borrow the raw key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    fn as_bytes(&self) -> &[u8; KEY_LENGTH];
}

/// Marker for keys allowed to encrypt and decrypt content.
pub trait ContentKey: SymmetricKey {}

/// The account master key.
///
/// Generated once per account at registration. It only ever leaves memory
/// wrapped under a password-derived key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Generate a fresh random master key.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            key: random_array()?,
        })
    }
}

impl SymmetricKey for MasterKey {
    fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl ContentKey for MasterKey {}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Key derived from the user's password.
///
/// Exists only while a wrap or unwrap is in progress. Not a content key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PasswordKey {
    key: [u8; KEY_LENGTH],
}

impl SymmetricKey for PasswordKey {
    fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for PasswordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordKey([REDACTED])")
    }
}

/// Per-file content key, the unit that gets wrapped for a share recipient.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey {
    key: [u8; KEY_LENGTH],
}

impl FileKey {
    /// Generate a random file key.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            key: random_array()?,
        })
    }
}

impl SymmetricKey for FileKey {
    fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl ContentKey for FileKey {}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey([REDACTED])")
    }
}

/// Salt for key derivation. Not secret; stored next to the wrapped key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Result<Self> {
        Ok(Self(random_array()?))
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }

    /// Encode for storage.
    pub fn to_base64(&self) -> String {
        encoding::encode(&self.0)
    }

    /// Decode a stored salt.
    ///
    /// # Errors
    /// - `InvalidInput` if malformed or not exactly `SALT_LENGTH` bytes
    pub fn from_base64(text: &str) -> Result<Self> {
        Ok(Self(encoding::decode_array(text)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_generate() {
        let key1 = MasterKey::generate().unwrap();
        let key2 = MasterKey::generate().unwrap();

        // Random keys should be different
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_file_key_generate() {
        let key1 = FileKey::generate().unwrap();
        let key2 = FileKey::generate().unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = MasterKey::from_bytes([0x41; KEY_LENGTH]);
        assert_eq!(format!("{:?}", key), "MasterKey([REDACTED])");
        let key = PasswordKey::from_bytes([0x41; KEY_LENGTH]);
        assert_eq!(format!("{:?}", key), "PasswordKey([REDACTED])");
    }

    #[test]
    fn test_salt_generate() {
        let salt1 = Salt::generate().unwrap();
        let salt2 = Salt::generate().unwrap();
        assert_ne!(salt1.as_bytes(), salt2.as_bytes());
    }

    #[test]
    fn test_salt_base64() {
        let salt = Salt::from_bytes([9u8; SALT_LENGTH]);
        let restored = Salt::from_base64(&salt.to_base64()).unwrap();
        assert_eq!(restored, salt);
    }

    #[test]
    fn test_salt_wrong_length_rejected() {
        let short = encoding::encode(&[1u8; 16]);
        assert!(Salt::from_base64(&short).is_err());
    }
}
