//! Persisted and transmitted account shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use zerokey_common::{Error, Result};
use zerokey_crypto::{encoding, EncryptedString, Salt, WrappedKey};
use zerokey_storage::{CredentialKeys, KeyValueStore};

/// Record format version for migration support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
    pub major: u32,
    pub minor: u32,
}

impl RecordVersion {
    /// Current record format version.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Check if this version is compatible with the current version.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

impl Default for RecordVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for RecordVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for RecordVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Storage(format!("Invalid record version: {}", s));
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Everything an account persists.
///
/// Each field is either public (`public_key`, `salt`, iteration count) or
/// ciphertext. The raw master key and raw private key never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Base64 SPKI DER public key.
    pub public_key: String,
    /// Master key wrapped under the password-derived key.
    pub wrapped_master_key: WrappedKey,
    /// Base64 PKCS8 private key encrypted under the master key.
    pub encrypted_private_key: EncryptedString,
    /// Base64 salt the wrapping key was derived with.
    pub salt: String,
    /// PBKDF2 iterations the wrapping key was derived with.
    pub kdf_iterations: u32,
    /// Record format version.
    #[serde(default)]
    pub version: RecordVersion,
}

impl AccountRecord {
    /// Decode the stored salt.
    pub fn salt(&self) -> Result<Salt> {
        Salt::from_base64(&self.salt)
    }

    /// Decode the public key to SPKI DER.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        encoding::decode(&self.public_key)
    }

    /// Serialize for the account-creation call.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a record returned by the server.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flatten into namespaced key-value entries for one atomic write.
    pub fn to_entries(&self, keys: &CredentialKeys) -> Result<Vec<(String, String)>> {
        Ok(vec![
            (keys.wrapped_master_key(), self.wrapped_master_key.to_json()?),
            (keys.encrypted_private_key(), self.encrypted_private_key.to_json()?),
            (keys.public_key(), self.public_key.clone()),
            (keys.salt(), self.salt.clone()),
            (keys.kdf_iterations(), self.kdf_iterations.to_string()),
            (keys.record_version(), self.version.to_string()),
        ])
    }

    /// Load the record stored under `keys`.
    ///
    /// # Returns
    /// - `Ok(None)` if no part of the record is stored
    ///
    /// # Errors
    /// - `Storage` if only part of the record is present or a field does
    ///   not parse
    pub async fn load(store: &dyn KeyValueStore, keys: &CredentialKeys) -> Result<Option<Self>> {
        let wrapped = store.get(&keys.wrapped_master_key()).await?;
        let private = store.get(&keys.encrypted_private_key()).await?;
        let public = store.get(&keys.public_key()).await?;
        let salt = store.get(&keys.salt()).await?;
        let iterations = store.get(&keys.kdf_iterations()).await?;
        let version = store.get(&keys.record_version()).await?;

        match (wrapped, private, public, salt, iterations) {
            (None, None, None, None, None) if version.is_none() => Ok(None),
            (Some(wrapped), Some(private), Some(public), Some(salt), Some(iterations)) => {
                let kdf_iterations = iterations
                    .parse()
                    .map_err(|_| Error::Storage("Invalid stored iteration count".to_string()))?;
                let version = match version {
                    Some(v) => v.parse()?,
                    None => RecordVersion::CURRENT,
                };

                Ok(Some(Self {
                    public_key: public,
                    wrapped_master_key: WrappedKey::from_json(&wrapped)
                        .map_err(|_| Error::Storage("Invalid stored wrapped key".to_string()))?,
                    encrypted_private_key: EncryptedString::from_json(&private)
                        .map_err(|_| Error::Storage("Invalid stored private key".to_string()))?,
                    salt,
                    kdf_iterations,
                    version,
                }))
            }
            _ => Err(Error::Storage("Incomplete account record".to_string())),
        }
    }
}

/// Upload metadata for one encrypted file, in the server's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadMetadata {
    /// Base64 ciphertext of the file name.
    pub encrypted_name: String,
    /// Base64 IV of the file name.
    #[serde(rename = "encryptedNameIV")]
    pub encrypted_name_iv: String,
    /// Ciphertext length including one 16-byte tag per chunk.
    pub encrypted_size: u64,
    /// Content type, stored in the clear.
    pub mime_type: String,
    /// Base64 base IV of the file contents.
    pub iv: String,
}

impl FileUploadMetadata {
    /// The encrypted name as a `{data, iv}` pair.
    pub fn encrypted_name(&self) -> EncryptedString {
        EncryptedString {
            data: self.encrypted_name.clone(),
            iv: self.encrypted_name_iv.clone(),
        }
    }
}

/// Ciphertext and metadata ready to hand to the upload call.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub metadata: FileUploadMetadata,
    pub ciphertext: Vec<u8>,
}

/// A downloaded file after decryption.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerokey_storage::MemoryStore;

    fn sample() -> AccountRecord {
        let encrypted = EncryptedString {
            data: "Y2lwaGVy".to_string(),
            iv: "AAAAAAAAAAAAAAAA".to_string(),
        };
        AccountRecord {
            public_key: "cHVibGlj".to_string(),
            wrapped_master_key: WrappedKey::from(encrypted.clone()),
            encrypted_private_key: encrypted,
            salt: Salt::from_bytes([9u8; 32]).to_base64(),
            kdf_iterations: 1_000,
            version: RecordVersion::CURRENT,
        }
    }

    #[test]
    fn test_version_compatibility() {
        assert!(RecordVersion::CURRENT.is_compatible());
        assert!(RecordVersion { major: 1, minor: 7 }.is_compatible());
        assert!(!RecordVersion { major: 2, minor: 0 }.is_compatible());
    }

    #[test]
    fn test_version_parse() {
        assert_eq!("1.0".parse::<RecordVersion>().unwrap(), RecordVersion::CURRENT);
        assert!("1".parse::<RecordVersion>().is_err());
        assert!("x.y".parse::<RecordVersion>().is_err());
    }

    #[test]
    fn test_record_json_field_names() {
        let json = sample().to_json().unwrap();
        for field in ["publicKey", "wrappedMasterKey", "encryptedPrivateKey", "salt", "kdfIterations"] {
            assert!(json.contains(field), "missing {}", field);
        }
        assert_eq!(AccountRecord::from_json(&json).unwrap(), sample());
    }

    #[tokio::test]
    async fn test_store_roundtrip() {
        let store = MemoryStore::new();
        let keys = CredentialKeys::default();

        assert_eq!(AccountRecord::load(&store, &keys).await.unwrap(), None);

        store.put_all(sample().to_entries(&keys).unwrap()).await.unwrap();
        let loaded = AccountRecord::load(&store, &keys).await.unwrap().unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(loaded.salt().unwrap(), Salt::from_bytes([9u8; 32]));
    }

    #[tokio::test]
    async fn test_partial_record_is_error() {
        let store = MemoryStore::new();
        let keys = CredentialKeys::default();
        store.put(&keys.salt(), "c2FsdA==").await.unwrap();

        assert!(matches!(
            AccountRecord::load(&store, &keys).await,
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_upload_metadata_field_names() {
        let metadata = FileUploadMetadata {
            encrypted_name: "bmFtZQ==".to_string(),
            encrypted_name_iv: "aXY=".to_string(),
            encrypted_size: 116,
            mime_type: "text/plain".to_string(),
            iv: "ZmlsZWl2".to_string(),
        };
        let value: serde_json::Value = serde_json::to_value(&metadata).unwrap();

        assert_eq!(value["encryptedName"], "bmFtZQ==");
        assert_eq!(value["encryptedNameIV"], "aXY=");
        assert_eq!(value["encryptedSize"], 116);
        assert_eq!(value["mimeType"], "text/plain");
        assert_eq!(value["iv"], "ZmlsZWl2");
    }
}
