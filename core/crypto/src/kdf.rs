//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! The derived key is a [`PasswordKey`]: it wraps and unwraps the master
//! key and nothing else. Derivation is a pure function of password, salt,
//! and iteration count, which is what makes a wrapped master key
//! recoverable without ever storing the password.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::keys::{PasswordKey, Salt, SymmetricKey, KEY_LENGTH};
use zerokey_common::{Error, Result};

/// System-wide PBKDF2 iteration count.
///
/// Changing it invalidates every wrapped key derived with the old count
/// unless the key is re-wrapped; persisted records carry the count they
/// were wrapped with.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Create parameters with an explicit iteration count.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// The production parameters.
    pub fn standard() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Cheap parameters for tests. Never use for real accounts.
    pub fn testing() -> Self {
        Self { iterations: 1_000 }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive a password key from a password and salt.
///
/// # Preconditions
/// - `password` must not be empty
/// - `params.iterations` must be non-zero
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - `InvalidInput` if the password is empty
/// - `KeyDerivation` if the iteration count is zero
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<PasswordKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    if params.iterations == 0 {
        return Err(Error::KeyDerivation(
            "Iteration count must be non-zero".to_string(),
        ));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), params.iterations, &mut key_bytes);

    Ok(PasswordKey::from_bytes(key_bytes))
}

/// Password key derivation with fixed parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDerivation {
    params: KdfParams,
}

impl KeyDerivation {
    /// Create a derivation component with the given parameters.
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// The parameters new derivations use.
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Same component with a different iteration count, for records
    /// wrapped before the current count was adopted.
    pub fn with_iterations(&self, iterations: u32) -> Self {
        Self {
            params: KdfParams::new(iterations),
        }
    }

    /// Derive a password key.
    ///
    /// With `salt` absent a fresh 32-byte salt is generated (registration
    /// and password change); otherwise the stored salt is used (login).
    /// The salt actually used is returned alongside the key.
    pub fn derive(&self, password: &[u8], salt: Option<&Salt>) -> Result<(PasswordKey, Salt)> {
        let salt = match salt {
            Some(salt) => salt.clone(),
            None => Salt::generate()?,
        };
        let key = derive_key(password, &salt, &self.params)?;
        Ok((key, salt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let password = b"test-password-123";
        let salt = Salt::from_bytes([42u8; 32]);
        let params = KdfParams::testing();

        let key1 = derive_key(password, &salt, &params).unwrap();
        let key2 = derive_key(password, &salt, &params).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let password = b"test-password-123";
        let params = KdfParams::testing();

        let key1 = derive_key(password, &Salt::from_bytes([1u8; 32]), &params).unwrap();
        let key2 = derive_key(password, &Salt::from_bytes([2u8; 32]), &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = Salt::from_bytes([42u8; 32]);
        let params = KdfParams::testing();

        let key1 = derive_key(b"password1", &salt, &params).unwrap();
        let key2 = derive_key(b"password2", &salt, &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_iterations_matter() {
        let salt = Salt::from_bytes([5u8; 32]);

        let key1 = derive_key(b"pw", &salt, &KdfParams::new(1_000)).unwrap();
        let key2 = derive_key(b"pw", &salt, &KdfParams::new(1_001)).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_known_vector() {
        // RFC 7914 section 11 PBKDF2-HMAC-SHA256 vector, first 32 bytes.
        let mut out = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(b"passwd", b"salt", 1, &mut out);
        assert_eq!(
            &out[..8],
            &[0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]
        );
    }

    #[test]
    fn test_derive_key_empty_password_fails() {
        let salt = Salt::generate().unwrap();
        assert!(matches!(
            derive_key(b"", &salt, &KdfParams::testing()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_iterations_fails() {
        let salt = Salt::generate().unwrap();
        assert!(matches!(
            derive_key(b"pw", &salt, &KdfParams::new(0)),
            Err(Error::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_component_generates_salt_when_absent() {
        let kdf = KeyDerivation::new(KdfParams::testing());

        let (key1, salt1) = kdf.derive(b"pw", None).unwrap();
        let (key2, salt2) = kdf.derive(b"pw", None).unwrap();
        assert_ne!(salt1, salt2);
        assert_ne!(key1.as_bytes(), key2.as_bytes());

        let (key3, salt3) = kdf.derive(b"pw", Some(&salt1)).unwrap();
        assert_eq!(salt3, salt1);
        assert_eq!(key3.as_bytes(), key1.as_bytes());
    }

    #[test]
    fn test_default_is_standard() {
        assert_eq!(KdfParams::default().iterations, 100_000);
        assert_eq!(KeyDerivation::default().params().iterations, DEFAULT_ITERATIONS);
    }
}
