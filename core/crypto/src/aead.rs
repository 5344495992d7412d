//! Authenticated encryption using AES-256-GCM.
//!
//! AES-GCM uses a 96-bit nonce that must never repeat under the same key.
//! Callers either take a fresh random nonce per message ([`encrypt`]) or
//! derive a unique one themselves ([`seal`], used for file chunks).

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce as GcmNonce,
};

use crate::keys::KEY_LENGTH;
use crate::random::random_array;
use zerokey_common::{Error, Result};

/// Nonce size for AES-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// A 96-bit AES-GCM nonce.
pub type Nonce = [u8; NONCE_SIZE];

/// Generate a random nonce.
pub fn generate_nonce() -> Result<Nonce> {
    random_array()
}

/// Encrypt with a caller-provided nonce and associated data.
///
/// # Preconditions
/// - `nonce` must never have been used with `key` before
///
/// # Postconditions
/// - Returns ciphertext || tag, `plaintext.len() + TAG_SIZE` bytes
///
/// # Errors
/// - `Encryption` if the cipher rejects the input
pub fn seal(key: &[u8; KEY_LENGTH], nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .encrypt(
            GcmNonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| Error::Encryption("AEAD seal rejected input".to_string()))
}

/// Decrypt and authenticate ciphertext || tag.
///
/// # Errors
/// - `Decryption` on any authentication failure, including a wrong key,
///   tampered data, or mismatched associated data
pub fn open(key: &[u8; KEY_LENGTH], nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(Error::Decryption);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(
            GcmNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| Error::Decryption)
}

/// Encrypt under a fresh random nonce.
///
/// Returns the ciphertext || tag and the nonce, which travels out of band.
pub fn encrypt(key: &[u8; KEY_LENGTH], plaintext: &[u8]) -> Result<(Vec<u8>, Nonce)> {
    let nonce = generate_nonce()?;
    let ciphertext = seal(key, &nonce, plaintext, &[])?;
    Ok((ciphertext, nonce))
}

/// Decrypt a message produced by [`encrypt`].
pub fn decrypt(key: &[u8; KEY_LENGTH], nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    open(key, nonce, ciphertext, &[])
}
