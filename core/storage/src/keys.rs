//! Storage key layout for account records.

/// Default namespace prefix.
pub const DEFAULT_NAMESPACE: &str = "zerokey";

/// Names of the keys one account record occupies, under a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialKeys {
    namespace: String,
}

impl CredentialKeys {
    /// Key layout under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}.{}", self.namespace, suffix)
    }

    pub fn wrapped_master_key(&self) -> String {
        self.key("wrappedMasterKey")
    }

    pub fn encrypted_private_key(&self) -> String {
        self.key("encryptedPrivateKey")
    }

    pub fn public_key(&self) -> String {
        self.key("publicKey")
    }

    pub fn salt(&self) -> String {
        self.key("salt")
    }

    pub fn kdf_iterations(&self) -> String {
        self.key("kdfIterations")
    }

    pub fn record_version(&self) -> String {
        self.key("recordVersion")
    }

    /// Every key of the record, for removal.
    pub fn all(&self) -> Vec<String> {
        vec![
            self.wrapped_master_key(),
            self.encrypted_private_key(),
            self.public_key(),
            self.salt(),
            self.kdf_iterations(),
            self.record_version(),
        ]
    }
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_names() {
        let keys = CredentialKeys::new("acct");
        assert_eq!(keys.wrapped_master_key(), "acct.wrappedMasterKey");
        assert_eq!(keys.salt(), "acct.salt");
        assert_eq!(keys.all().len(), 6);
    }

    #[test]
    fn test_default_namespace() {
        assert_eq!(CredentialKeys::default().public_key(), "zerokey.publicKey");
    }
}
