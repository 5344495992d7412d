//! Cryptographically secure randomness.
//!
//! Every IV, salt, and generated key in the engine draws from here.

use rand::rngs::OsRng;
use rand::RngCore;

use zerokey_common::{Error, Result};

/// Fill `dest` from the operating system's CSPRNG.
///
/// # Errors
/// - Returns a fatal `Crypto` error if the OS source is unavailable
pub fn fill_random(dest: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(dest)
        .map_err(|_| Error::Crypto("Secure random source unavailable".to_string()))
}

/// Generate a fixed-size array of random bytes.
pub fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    fill_random(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_array_differs() {
        let a: [u8; 32] = random_array().unwrap();
        let b: [u8; 32] = random_array().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fill_empty_slice() {
        let mut empty: [u8; 0] = [];
        assert!(fill_random(&mut empty).is_ok());
    }
}
