//! Common error types for ZeroKey.
//!
//! Display strings may reach end users and never carry cryptographic
//! diagnostics from the underlying primitives.

use thiserror::Error;

/// Top-level error type for ZeroKey operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Password-based key derivation could not run (bad parameters or
    /// platform crypto unavailable). Fatal.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// A wrapped key failed authentication: wrong password or tampered
    /// ciphertext. The two causes are never distinguished.
    #[error("Invalid credentials")]
    UnwrapAuthentication,

    /// Ciphertext failed authentication under the supplied key.
    #[error("Decryption failed")]
    Decryption,

    /// An operation needed session key material but none is loaded.
    #[error("Session keys unavailable; re-authentication required")]
    SessionKeyUnavailable,

    /// Encryption could not complete, usually because the host failed to
    /// supply input or accept output.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Platform cryptography rejected an operation (unsupported algorithm,
    /// disallowed key usage). Fatal configuration error.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not valid in the current account state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Persistent storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A long-running operation observed its cancellation signal.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the user can recover by retrying, typically after
    /// re-entering a password. The session stays valid.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnwrapAuthentication | Error::Decryption | Error::Encryption(_) | Error::Cancelled
        )
    }

    /// Whether the caller must send the user back through login or unlock.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::SessionKeyUnavailable)
    }

    /// Whether the error reflects a broken platform or configuration and
    /// must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::KeyDerivation(_) | Error::Crypto(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
