//! RSA-OAEP key pairs for sharing.
//!
//! Each account owns one key pair. The public key is stored in the clear
//! (SPKI DER); the private key leaves memory only as PKCS8 DER that the
//! caller immediately encrypts under the master key. With the pair in
//! place another user can wrap a per-file key to this account without
//! involving its password.

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::keys::{FileKey, SymmetricKey, KEY_LENGTH};
use zerokey_common::{Error, Result, SensitiveBytes};

/// Production modulus size.
pub const RSA_MODULUS_BITS: usize = 4096;

/// Smallest modulus the service will generate or accept.
pub const MIN_MODULUS_BITS: usize = 2048;

/// Public exponent used for generated keys.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// An RSA-OAEP public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Modulus size in bits.
    pub fn modulus_bits(&self) -> usize {
        self.0.n().bits()
    }
}

/// An RSA-OAEP private key. Zeroized on drop by the underlying type.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// An account's key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// Generates, exports, and imports RSA-OAEP (SHA-256) key pairs.
#[derive(Debug, Clone, Copy)]
pub struct AsymmetricKeyService {
    modulus_bits: usize,
}

impl Default for AsymmetricKeyService {
    fn default() -> Self {
        Self {
            modulus_bits: RSA_MODULUS_BITS,
        }
    }
}

impl AsymmetricKeyService {
    /// Service generating keys of `modulus_bits`.
    ///
    /// # Errors
    /// - `InvalidInput` if `modulus_bits` is below `MIN_MODULUS_BITS`
    pub fn new(modulus_bits: usize) -> Result<Self> {
        if modulus_bits < MIN_MODULUS_BITS {
            return Err(Error::InvalidInput(format!(
                "RSA modulus must be at least {} bits",
                MIN_MODULUS_BITS
            )));
        }
        Ok(Self { modulus_bits })
    }

    /// Modulus size of generated keys.
    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// Generate a key pair.
    ///
    /// CPU-heavy (seconds for 4096 bits); async callers should run it on a
    /// blocking thread.
    pub fn generate_key_pair(&self) -> Result<KeyPair> {
        let exponent = BigUint::from(PUBLIC_EXPONENT);
        let private = RsaPrivateKey::new_with_exp(&mut OsRng, self.modulus_bits, &exponent)
            .map_err(|_| Error::Crypto("RSA key generation failed".to_string()))?;
        let public = private.to_public_key();

        Ok(KeyPair {
            public_key: PublicKey(public),
            private_key: PrivateKey(private),
        })
    }

    /// Export a public key as SPKI DER.
    pub fn export_public_key(&self, key: &PublicKey) -> Result<Vec<u8>> {
        let der = key
            .0
            .to_public_key_der()
            .map_err(|_| Error::Crypto("Public key export failed".to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    /// Import an SPKI DER public key.
    ///
    /// # Errors
    /// - `InvalidInput` if the bytes are not an RSA SPKI document or the
    ///   modulus is too small
    pub fn import_public_key(&self, der: &[u8]) -> Result<PublicKey> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|_| Error::InvalidInput("Malformed public key".to_string()))?;
        if key.n().bits() < MIN_MODULUS_BITS {
            return Err(Error::InvalidInput("Public key modulus too small".to_string()));
        }
        Ok(PublicKey(key))
    }

    /// Export a private key as PKCS8 DER.
    ///
    /// The result must be encrypted before it is persisted anywhere.
    pub fn export_private_key(&self, key: &PrivateKey) -> Result<SensitiveBytes> {
        let der = key
            .0
            .to_pkcs8_der()
            .map_err(|_| Error::Crypto("Private key export failed".to_string()))?;
        Ok(SensitiveBytes::new(der.as_bytes().to_vec()))
    }

    /// Import a PKCS8 DER private key.
    ///
    /// # Errors
    /// - `Decryption` if the bytes are not a valid RSA PKCS8 document; they
    ///   only ever come out of a decrypted record, so garbage here means the
    ///   record was corrupted
    pub fn import_private_key(&self, der: &[u8]) -> Result<PrivateKey> {
        let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|_| Error::Decryption)?;
        Ok(PrivateKey(key))
    }

    /// Wrap a per-file key so only the holder of `recipient`'s private key
    /// can recover it.
    pub fn wrap_for_recipient(&self, recipient: &PublicKey, file_key: &FileKey) -> Result<Vec<u8>> {
        recipient
            .0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), file_key.as_bytes())
            .map_err(|_| Error::Encryption("Key wrap for recipient failed".to_string()))
    }

    /// Recover a per-file key wrapped with [`wrap_for_recipient`](Self::wrap_for_recipient).
    ///
    /// # Errors
    /// - `Decryption` if the ciphertext was not produced for this key pair
    pub fn unwrap_from_sender(&self, private_key: &PrivateKey, wrapped: &[u8]) -> Result<FileKey> {
        let mut plaintext = private_key
            .0
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| Error::Decryption)?;

        let result = <[u8; KEY_LENGTH]>::try_from(plaintext.as_slice())
            .map(FileKey::from_bytes)
            .map_err(|_| Error::Decryption);
        plaintext.zeroize();
        result
    }
}
