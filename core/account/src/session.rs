//! Session key storage.
//!
//! The session store holds the live master key and private key for the
//! signed-in account. It has no serialization and no persistence hook;
//! keys are zeroized when cleared or dropped.

use uuid::Uuid;

use zerokey_common::{Error, Result};
use zerokey_crypto::{MasterKey, PrivateKey};

/// Session handle for tracking the signed-in session.
///
/// Survives lock and unlock; replaced on every login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Generate a new unique session handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory holder of one master key and one private key.
///
/// Only the account manager mutates it. Everything else borrows key
/// handles through the getters.
#[derive(Default)]
pub struct SessionKeyStore {
    master_key: Option<MasterKey>,
    private_key: Option<PrivateKey>,
}

impl SessionKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_master_key(&mut self, key: MasterKey) {
        self.master_key = Some(key);
    }

    pub(crate) fn set_private_key(&mut self, key: PrivateKey) {
        self.private_key = Some(key);
    }

    /// The live master key, if loaded.
    pub fn master_key(&self) -> Option<&MasterKey> {
        self.master_key.as_ref()
    }

    /// The live private key, if loaded.
    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    /// The master key, or `SessionKeyUnavailable`.
    pub fn require_master_key(&self) -> Result<&MasterKey> {
        self.master_key.as_ref().ok_or(Error::SessionKeyUnavailable)
    }

    /// The private key, or `SessionKeyUnavailable`.
    pub fn require_private_key(&self) -> Result<&PrivateKey> {
        self.private_key.as_ref().ok_or(Error::SessionKeyUnavailable)
    }

    /// Whether both keys are loaded.
    pub fn is_loaded(&self) -> bool {
        self.master_key.is_some() && self.private_key.is_some()
    }

    /// Drop both keys. Dropping zeroizes them.
    pub(crate) fn clear(&mut self) {
        self.master_key = None;
        self.private_key = None;
    }
}

impl std::fmt::Debug for SessionKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyStore")
            .field("master_key", &self.master_key.is_some())
            .field("private_key", &self.private_key.is_some())
            .finish()
    }
}
