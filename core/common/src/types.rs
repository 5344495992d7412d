//! Common types used throughout ZeroKey.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive data wrapper that zeroizes on drop.
///
/// Used for exported private keys and other raw secret material that has
/// to leave a typed key handle for a moment.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SensitiveBytes {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_bytes_debug_redacts() {
        let bytes = SensitiveBytes::new(vec![0xAA; 4]);
        let debug = format!("{:?}", bytes);
        assert_eq!(debug, "SensitiveBytes([REDACTED; 4 bytes])");
        assert!(!debug.contains("170"));
    }

    #[test]
    fn test_sensitive_bytes_accessors() {
        let bytes = SensitiveBytes::from(vec![1, 2, 3]);
        assert_eq!(bytes.as_bytes(), &[1, 2, 3]);
        assert_eq!(bytes.len(), 3);
        assert!(!bytes.is_empty());
        assert!(SensitiveBytes::new(Vec::new()).is_empty());
    }
}
