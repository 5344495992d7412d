//! Cryptographic primitives for ZeroKey.
//!
//! This module provides:
//! - Password-based key derivation using PBKDF2-HMAC-SHA256
//! - Authenticated encryption using AES-256-GCM
//! - Key wrapping of one symmetric key under another
//! - Chunked encryption for large files with per-chunk nonces
//! - RSA-OAEP key pairs for wrapping shared file keys
//!
//! # Security Guarantees
//! - All symmetric key material is zeroized on drop
//! - No plaintext, password, or key material is ever logged
//! - Authentication failures surface as generic errors only

pub mod aead;
pub mod asymmetric;
pub mod encoding;
pub mod kdf;
pub mod keys;
pub mod random;
pub mod stream;
pub mod string;
pub mod wrap;

pub use asymmetric::{AsymmetricKeyService, KeyPair, PrivateKey, PublicKey, RSA_MODULUS_BITS};
pub use kdf::{derive_key, KdfParams, KeyDerivation, DEFAULT_ITERATIONS};
pub use keys::{ContentKey, FileKey, MasterKey, PasswordKey, Salt, SymmetricKey, KEY_LENGTH};
pub use stream::{
    ChunkOptions, ChunkedFileCipher, EncryptedBlob, ProgressObserver, DEFAULT_CHUNK_SIZE,
    MAX_CHUNK_SIZE,
};
pub use string::{EncryptedString, StringCipher};
pub use wrap::{KeyWrapping, WrappedKey};
