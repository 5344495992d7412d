//! Engine configuration.

use serde::{Deserialize, Serialize};

use zerokey_common::{Error, Result};
use zerokey_crypto::asymmetric::MIN_MODULUS_BITS;
use zerokey_crypto::{KdfParams, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, RSA_MODULUS_BITS};
use zerokey_storage::DEFAULT_NAMESPACE;

/// Tunables for the key engine.
///
/// The defaults are the production constants. Records store the iteration
/// count they were wrapped with, so raising `kdf.iterations` later only
/// affects new wraps (registration and password change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// PBKDF2 parameters for new wraps.
    pub kdf: KdfParams,
    /// Plaintext bytes per file chunk.
    pub chunk_size: usize,
    /// RSA modulus for newly generated key pairs.
    pub rsa_modulus_bits: usize,
    /// Prefix for persisted record keys.
    pub storage_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::standard(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            rsa_modulus_bits: RSA_MODULUS_BITS,
            storage_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Cheap settings for tests: 1000 iterations, 2048-bit RSA, 64 KiB
    /// chunks. Never use for real accounts.
    pub fn testing() -> Self {
        Self {
            kdf: KdfParams::testing(),
            chunk_size: 64 * 1024,
            rsa_modulus_bits: MIN_MODULUS_BITS,
            storage_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Check the configuration can build working components.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero or oversized chunk size, a modulus below 2048 bits,
    ///   zero iterations, or an empty namespace
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidInput(format!(
                "Chunk size must be between 1 and {} bytes",
                MAX_CHUNK_SIZE
            )));
        }
        if self.rsa_modulus_bits < MIN_MODULUS_BITS {
            return Err(Error::InvalidInput(format!(
                "RSA modulus must be at least {} bits",
                MIN_MODULUS_BITS
            )));
        }
        if self.kdf.iterations == 0 {
            return Err(Error::InvalidInput(
                "KDF iterations must be non-zero".to_string(),
            ));
        }
        if self.storage_namespace.is_empty() {
            return Err(Error::InvalidInput(
                "Storage namespace cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize and validate configuration from JSON. Missing fields take
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_production_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.kdf.iterations, 100_000);
        assert_eq!(config.chunk_size, 64 * 1024 * 1024);
        assert_eq!(config.rsa_modulus_bits, 4096);
        assert_eq!(config.storage_namespace, "zerokey");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::testing();
        config.chunk_size = 0;
        assert!(config.validate().is_err());

        #[cfg(target_pointer_width = "64")]
        {
            let mut config = EngineConfig::testing();
            config.chunk_size = usize::MAX;
            assert!(config.validate().is_err());
        }

        let mut config = EngineConfig::testing();
        config.rsa_modulus_bits = 1024;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::testing();
        config.kdf.iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::testing();
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = EngineConfig::from_json(r#"{ "storage_namespace": "work" }"#).unwrap();
        assert_eq!(config.storage_namespace, "work");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "chunk_size": 0 }"#),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(Error::Serialization(_))
        ));
    }
}
