//! Account manager: the key hierarchy state machine.
//!
//! Composes key derivation, key wrapping, the string and file ciphers, and
//! the asymmetric key service into register, login, lock, unlock, logout,
//! and password change. All components are injected; the manager resolves
//! nothing at runtime.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::EngineConfig;
use crate::records::{AccountRecord, DownloadedFile, FileUploadMetadata, PreparedUpload, RecordVersion};
use crate::session::{SessionHandle, SessionKeyStore};
use crate::state::AccountState;
use zerokey_common::{Error, Result, SensitiveBytes};
use zerokey_crypto::aead::Nonce;
use zerokey_crypto::{
    encoding, AsymmetricKeyService, ChunkOptions, ChunkedFileCipher, EncryptedBlob,
    EncryptedString, FileKey, KeyDerivation, KeyWrapping, MasterKey, PrivateKey, StringCipher,
};
use zerokey_storage::{CredentialKeys, KeyValueStore};

/// The already-constructed collaborators an [`AccountManager`] runs on.
pub struct AccountComponents {
    pub key_derivation: KeyDerivation,
    pub key_wrapping: KeyWrapping,
    pub string_cipher: StringCipher,
    pub file_cipher: ChunkedFileCipher,
    pub asymmetric: AsymmetricKeyService,
    pub store: Arc<dyn KeyValueStore>,
    pub credential_keys: CredentialKeys,
}

impl AccountComponents {
    /// Build components from validated configuration.
    ///
    /// # Errors
    /// - `InvalidInput` if the configuration does not validate
    pub fn from_config(config: &EngineConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            key_derivation: KeyDerivation::new(config.kdf),
            key_wrapping: KeyWrapping::new(),
            string_cipher: StringCipher::new(),
            file_cipher: ChunkedFileCipher::with_chunk_size(config.chunk_size)?,
            asymmetric: AsymmetricKeyService::new(config.rsa_modulus_bits)?,
            store,
            credential_keys: CredentialKeys::new(config.storage_namespace.clone()),
        })
    }

    async fn create_account(
        &self,
        password: &str,
    ) -> Result<(AccountRecord, MasterKey, PrivateKey)> {
        let (password_key, salt) = self.key_derivation.derive(password.as_bytes(), None)?;
        let master_key = MasterKey::generate()?;

        let asymmetric = self.asymmetric;
        let key_pair = tokio::task::spawn_blocking(move || asymmetric.generate_key_pair())
            .await
            .map_err(|e| Error::Crypto(format!("Key generation task failed: {}", e)))??;

        let wrapped_master_key = self.key_wrapping.wrap_key(&master_key, &password_key)?;

        let private_der = asymmetric.export_private_key(&key_pair.private_key)?;
        let private_encoded = Zeroizing::new(encoding::encode(private_der.as_bytes()));
        let encrypted_private_key = self
            .string_cipher
            .encrypt(&private_encoded, &master_key)?;

        let public_key = encoding::encode(&asymmetric.export_public_key(&key_pair.public_key)?);

        let record = AccountRecord {
            public_key,
            wrapped_master_key,
            encrypted_private_key,
            salt: salt.to_base64(),
            kdf_iterations: self.key_derivation.params().iterations,
            version: RecordVersion::CURRENT,
        };
        self.persist(&record).await?;

        Ok((record, master_key, key_pair.private_key))
    }

    async fn persist(&self, record: &AccountRecord) -> Result<()> {
        let entries = record.to_entries(&self.credential_keys)?;
        self.store.put_all(entries).await
    }

    fn unwrap_master_key(&self, password: &str, record: &AccountRecord) -> Result<MasterKey> {
        if !record.version.is_compatible() {
            return Err(Error::InvalidState(format!(
                "Incompatible record version: {}",
                record.version
            )));
        }

        // Unusable KDF inputs fail the same way as a wrong password.
        let salt = record.salt().map_err(|_| Error::UnwrapAuthentication)?;
        if record.kdf_iterations == 0 {
            return Err(Error::UnwrapAuthentication);
        }
        let kdf = self.key_derivation.with_iterations(record.kdf_iterations);
        let (password_key, _) = kdf.derive(password.as_bytes(), Some(&salt))?;

        self.key_wrapping
            .unwrap_key(&record.wrapped_master_key, &password_key)
    }

    fn unlock_keys(&self, password: &str, record: &AccountRecord) -> Result<(MasterKey, PrivateKey)> {
        let master_key = self.unwrap_master_key(password, record)?;

        let private_encoded = Zeroizing::new(
            self.string_cipher
                .decrypt(&record.encrypted_private_key, &master_key)?,
        );
        let private_der = SensitiveBytes::new(
            encoding::decode(&private_encoded).map_err(|_| Error::Decryption)?,
        );
        let private_key = self.asymmetric.import_private_key(private_der.as_bytes())?;

        let public_der = record.public_key_der().map_err(|_| Error::Decryption)?;
        let public_key = self
            .asymmetric
            .import_public_key(&public_der)
            .map_err(|_| Error::Decryption)?;
        if private_key.public_key() != public_key {
            return Err(Error::Decryption);
        }

        Ok((master_key, private_key))
    }
}

/// Holds the manager in a transitional state for the length of one call.
///
/// Dropping it while the state is still transitional (an error return, or
/// the caller dropping the future at an await) puts the manager back to
/// `Anonymous`.
struct Transition<'a> {
    state: &'a mut AccountState,
}

impl<'a> Transition<'a> {
    fn enter(state: &'a mut AccountState, to: AccountState) -> Self {
        *state = to;
        Self { state }
    }

    fn settle(mut self, to: AccountState) {
        *self.state = to;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if self.state.is_transitional() {
            debug!(from = %self.state, "Transition abandoned");
            *self.state = AccountState::Anonymous;
        }
    }
}

/// Keys unwrapped by a password check, waiting on the second factor.
struct PendingLogin {
    master_key: MasterKey,
    private_key: PrivateKey,
    record: AccountRecord,
}

/// Owns the session keys and drives the account lifecycle.
pub struct AccountManager {
    components: AccountComponents,
    session: SessionKeyStore,
    state: AccountState,
    handle: Option<SessionHandle>,
    pending: Option<PendingLogin>,
}

impl AccountManager {
    /// Create a manager in the `Anonymous` state.
    pub fn new(components: AccountComponents) -> Self {
        Self {
            components,
            session: SessionKeyStore::new(),
            state: AccountState::Anonymous,
            handle: None,
            pending: None,
        }
    }

    /// Create a manager with components built from `config`.
    pub fn with_config(config: &EngineConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(Self::new(AccountComponents::from_config(config, store)?))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AccountState {
        self.state
    }

    /// Read-only view of the session keys.
    pub fn session(&self) -> &SessionKeyStore {
        &self.session
    }

    /// Handle of the signed-in session, kept across lock and unlock.
    pub fn session_handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    /// The injected collaborators.
    pub fn components(&self) -> &AccountComponents {
        &self.components
    }

    /// The account record currently persisted, if any.
    pub async fn stored_record(&self) -> Result<Option<AccountRecord>> {
        AccountRecord::load(self.components.store.as_ref(), &self.components.credential_keys).await
    }

    /// Resume after a restart.
    ///
    /// If a record is persisted the manager moves to `Locked` so the next
    /// step is `unlock`; otherwise it stays `Anonymous`.
    ///
    /// # Returns
    /// Whether a record was found.
    pub async fn restore(&mut self) -> Result<bool> {
        self.require_state(AccountState::Anonymous, "restore")?;

        if self.stored_record().await?.is_none() {
            return Ok(false);
        }

        self.handle = Some(SessionHandle::new());
        self.state = AccountState::Locked;
        debug!("Persisted account found; session locked");
        Ok(true)
    }

    /// Register a new account.
    ///
    /// # Preconditions
    /// - State is `Anonymous`
    /// - Password must not be empty
    ///
    /// # Postconditions
    /// - A fresh master key and key pair are in the session store
    /// - The record is persisted, replacing any previous one
    /// - State is `Authenticated`
    /// - If the call fails or its future is dropped, state is `Anonymous`
    ///
    /// # Returns
    /// The record for the account-creation call.
    ///
    /// # Errors
    /// - `InvalidState` outside `Anonymous`
    /// - `InvalidInput` for an empty password
    /// - `Storage` if the record could not be persisted
    pub async fn register(&mut self, password: &str) -> Result<AccountRecord> {
        self.require_state(AccountState::Anonymous, "register")?;
        let transition = Transition::enter(&mut self.state, AccountState::Registering);

        let (record, master_key, private_key) = self
            .components
            .create_account(password)
            .await
            .inspect_err(|e| warn!(error = %e, "Registration failed"))?;
        transition.settle(AccountState::Authenticated);

        self.handle = Some(SessionHandle::new());
        self.install_keys(master_key, private_key);
        info!(kdf_iterations = record.kdf_iterations, "Account registered");
        Ok(record)
    }

    /// Log in with a password and the account's stored record.
    ///
    /// # Postconditions
    /// - On success the session store holds the unwrapped keys, the record
    ///   is persisted locally, and state is `Authenticated`
    /// - On failure, or if the future is dropped, state returns to `Anonymous`
    ///
    /// # Errors
    /// - `UnwrapAuthentication` for a wrong password or tampered record
    /// - `Decryption` if the private key does not decrypt or does not
    ///   match the public key
    pub async fn login(&mut self, password: &str, record: &AccountRecord) -> Result<()> {
        self.require_state(AccountState::Anonymous, "log in")?;
        let transition = Transition::enter(&mut self.state, AccountState::LoggingIn);

        let (master_key, private_key) = self
            .components
            .unlock_keys(password, record)
            .inspect_err(|e| warn!(error = %e, "Login rejected"))?;
        self.components.persist(record).await?;
        transition.settle(AccountState::Authenticated);

        self.handle = Some(SessionHandle::new());
        self.install_keys(master_key, private_key);
        info!("Logged in");
        Ok(())
    }

    /// Password step of a two-factor login.
    ///
    /// On success the keys are staged outside the session store and state
    /// is `TwoFactorPending`; call [`confirm_two_factor`](Self::confirm_two_factor)
    /// once the second factor is verified.
    pub async fn login_with_two_factor(
        &mut self,
        password: &str,
        record: &AccountRecord,
    ) -> Result<()> {
        self.require_state(AccountState::Anonymous, "log in")?;
        let transition = Transition::enter(&mut self.state, AccountState::LoggingIn);

        let (master_key, private_key) = self
            .components
            .unlock_keys(password, record)
            .inspect_err(|e| warn!(error = %e, "Login rejected"))?;
        transition.settle(AccountState::TwoFactorPending);

        self.pending = Some(PendingLogin {
            master_key,
            private_key,
            record: record.clone(),
        });
        debug!("Password accepted; awaiting second factor");
        Ok(())
    }

    /// Complete a two-factor login.
    ///
    /// # Errors
    /// - `InvalidState` unless state is `TwoFactorPending`
    /// - `Storage` if the record could not be persisted; the staged keys
    ///   stay pending so the call can be retried
    pub async fn confirm_two_factor(&mut self) -> Result<()> {
        self.require_state(AccountState::TwoFactorPending, "confirm second factor")?;

        let pending = self
            .pending
            .take()
            .ok_or_else(|| Error::InvalidState("No login pending".to_string()))?;

        if let Err(e) = self.components.persist(&pending.record).await {
            self.pending = Some(pending);
            return Err(e);
        }

        self.handle = Some(SessionHandle::new());
        self.install_keys(pending.master_key, pending.private_key);
        info!("Logged in with second factor");
        Ok(())
    }

    /// Abandon a pending two-factor login. Staged keys are dropped.
    pub fn abort_login(&mut self) -> Result<()> {
        self.require_state(AccountState::TwoFactorPending, "abort login")?;
        self.pending = None;
        self.state = AccountState::Anonymous;
        debug!("Pending login aborted");
        Ok(())
    }

    /// Forget session keys while staying signed in.
    ///
    /// # Postconditions
    /// - Session store is empty; persisted record and session handle remain
    /// - State is `Locked`
    pub fn lock(&mut self) -> Result<()> {
        self.require_state(AccountState::Authenticated, "lock")?;
        self.session.clear();
        self.state = AccountState::Locked;
        info!("Session locked");
        Ok(())
    }

    /// Reload session keys from the persisted record.
    ///
    /// A wrong password leaves the session `Locked`.
    ///
    /// # Errors
    /// - `InvalidState` unless state is `Locked`
    /// - `NotFound` if no record is persisted
    /// - `UnwrapAuthentication` for a wrong password
    pub async fn unlock(&mut self, password: &str) -> Result<()> {
        self.require_state(AccountState::Locked, "unlock")?;

        let record = self
            .stored_record()
            .await?
            .ok_or_else(|| Error::NotFound("No account record stored".to_string()))?;

        match self.components.unlock_keys(password, &record) {
            Ok((master_key, private_key)) => {
                self.install_keys(master_key, private_key);
                info!("Session unlocked");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Unlock rejected");
                Err(e)
            }
        }
    }

    /// Sign out: clear keys, drop the session, and remove the persisted
    /// record. Valid from any state.
    ///
    /// Keys are cleared before storage is touched, so a storage error still
    /// leaves the manager `Anonymous` with no key material.
    pub async fn logout(&mut self) -> Result<()> {
        self.session.clear();
        self.pending = None;
        self.handle = None;
        self.state = AccountState::Anonymous;

        self.components
            .store
            .remove_all(&self.components.credential_keys.all())
            .await?;
        info!("Logged out");
        Ok(())
    }

    /// Re-wrap the master key under a new password.
    ///
    /// The master key and the encrypted private key are unchanged. The new
    /// salt, wrapped key, and iteration count are written in one batch.
    ///
    /// # Returns
    /// The updated record for the server-side update.
    ///
    /// # Errors
    /// - `InvalidState` unless state is `Authenticated`
    /// - `UnwrapAuthentication` if `current` is wrong
    /// - `Storage` if the batch write failed; the old record stays valid
    pub async fn change_password(&mut self, current: &str, new: &str) -> Result<AccountRecord> {
        self.require_state(AccountState::Authenticated, "change password")?;

        let record = self
            .stored_record()
            .await?
            .ok_or_else(|| Error::NotFound("No account record stored".to_string()))?;

        let master_key = self.components.unwrap_master_key(current, &record)?;

        let components = &self.components;
        let (password_key, salt) = components.key_derivation.derive(new.as_bytes(), None)?;
        let wrapped_master_key = components.key_wrapping.wrap_key(&master_key, &password_key)?;

        let updated = AccountRecord {
            wrapped_master_key,
            salt: salt.to_base64(),
            kdf_iterations: components.key_derivation.params().iterations,
            version: RecordVersion::CURRENT,
            ..record
        };
        components.persist(&updated).await?;

        info!(kdf_iterations = updated.kdf_iterations, "Password changed");
        Ok(updated)
    }

    /// Encrypt a file or folder name under the master key.
    pub fn encrypt_name(&self, name: &str) -> Result<EncryptedString> {
        let key = self.session.require_master_key()?;
        self.components.string_cipher.encrypt(name, key)
    }

    /// Decrypt a file or folder name.
    pub fn decrypt_name(&self, encrypted: &EncryptedString) -> Result<String> {
        let key = self.session.require_master_key()?;
        self.components.string_cipher.decrypt(encrypted, key)
    }

    /// Encrypt file contents held in memory.
    pub async fn encrypt_file(
        &self,
        data: &[u8],
        options: &ChunkOptions<'_>,
    ) -> Result<EncryptedBlob> {
        let key = self.session.require_master_key()?;
        self.components.file_cipher.encrypt_bytes(key, data, options).await
    }

    /// Decrypt file contents held in memory.
    pub async fn decrypt_file(
        &self,
        blob: &EncryptedBlob,
        options: &ChunkOptions<'_>,
    ) -> Result<Vec<u8>> {
        let key = self.session.require_master_key()?;
        self.components.file_cipher.decrypt_bytes(key, blob, options).await
    }

    /// Encrypt file contents from a reader of known length.
    pub async fn encrypt_file_stream<R, W>(
        &self,
        reader: R,
        total_len: u64,
        writer: W,
        options: &ChunkOptions<'_>,
    ) -> Result<Nonce>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let key = self.session.require_master_key()?;
        self.components
            .file_cipher
            .encrypt_stream(key, reader, total_len, writer, options)
            .await
    }

    /// Decrypt file contents from a reader of known length.
    pub async fn decrypt_file_stream<R, W>(
        &self,
        iv: &Nonce,
        reader: R,
        encrypted_len: u64,
        writer: W,
        options: &ChunkOptions<'_>,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let key = self.session.require_master_key()?;
        self.components
            .file_cipher
            .decrypt_stream(key, iv, reader, encrypted_len, writer, options)
            .await
    }

    /// Encrypt a file's name and contents for upload.
    pub async fn prepare_upload(
        &self,
        name: &str,
        mime_type: &str,
        data: &[u8],
        options: &ChunkOptions<'_>,
    ) -> Result<PreparedUpload> {
        let key = self.session.require_master_key()?;
        let encrypted_name = self.components.string_cipher.encrypt(name, key)?;
        let blob = self
            .components
            .file_cipher
            .encrypt_bytes(key, data, options)
            .await?;

        let metadata = FileUploadMetadata {
            encrypted_name: encrypted_name.data,
            encrypted_name_iv: encrypted_name.iv,
            encrypted_size: blob.data.len() as u64,
            mime_type: mime_type.to_string(),
            iv: blob.iv_base64(),
        };
        debug!(encrypted_size = metadata.encrypted_size, "Upload prepared");

        Ok(PreparedUpload {
            metadata,
            ciphertext: blob.data,
        })
    }

    /// Decrypt a downloaded file against its upload metadata.
    ///
    /// # Errors
    /// - `Decryption` if the ciphertext length disagrees with the metadata
    ///   or any field fails authentication
    pub async fn open_download(
        &self,
        metadata: &FileUploadMetadata,
        ciphertext: Vec<u8>,
        options: &ChunkOptions<'_>,
    ) -> Result<DownloadedFile> {
        let key = self.session.require_master_key()?;
        if ciphertext.len() as u64 != metadata.encrypted_size {
            return Err(Error::Decryption);
        }

        let name = self
            .components
            .string_cipher
            .decrypt(&metadata.encrypted_name(), key)?;
        let blob = EncryptedBlob::from_parts(ciphertext, &metadata.iv)
            .map_err(|_| Error::Decryption)?;
        let data = self
            .components
            .file_cipher
            .decrypt_bytes(key, &blob, options)
            .await?;

        Ok(DownloadedFile {
            name,
            mime_type: metadata.mime_type.clone(),
            data,
        })
    }

    /// Wrap a per-file key to another account's SPKI public key.
    pub fn share_file_key(&self, recipient_public_key: &[u8], file_key: &FileKey) -> Result<Vec<u8>> {
        self.session.require_master_key()?;
        let asymmetric = &self.components.asymmetric;
        let recipient = asymmetric.import_public_key(recipient_public_key)?;
        asymmetric.wrap_for_recipient(&recipient, file_key)
    }

    /// Recover a per-file key shared to this account.
    pub fn receive_file_key(&self, wrapped: &[u8]) -> Result<FileKey> {
        let private_key = self.session.require_private_key()?;
        self.components
            .asymmetric
            .unwrap_from_sender(private_key, wrapped)
    }

    fn require_state(&self, expected: AccountState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "Cannot {} while {}",
                operation, self.state
            )));
        }
        Ok(())
    }

    fn install_keys(&mut self, master_key: MasterKey, private_key: PrivateKey) {
        self.session.set_master_key(master_key);
        self.session.set_private_key(private_key);
        self.state = AccountState::Authenticated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerokey_storage::MemoryStore;

    fn manager() -> AccountManager {
        AccountManager::with_config(&EngineConfig::testing(), Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_new_manager_is_anonymous() {
        let manager = manager();
        assert_eq!(manager.state(), AccountState::Anonymous);
        assert!(manager.session_handle().is_none());
        assert!(!manager.session().is_loaded());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::testing();
        config.chunk_size = 0;
        assert!(AccountManager::with_config(&config, Arc::new(MemoryStore::new())).is_err());
    }

    #[test]
    fn test_lock_requires_authenticated() {
        let mut manager = manager();
        assert!(matches!(manager.lock(), Err(Error::InvalidState(_))));
        assert!(matches!(manager.abort_login(), Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_unlock_requires_locked() {
        let mut manager = manager();
        assert!(matches!(
            manager.unlock("pw").await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            manager.confirm_two_factor().await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_content_ops_need_session() {
        let manager = manager();
        assert!(matches!(
            manager.encrypt_name("x"),
            Err(Error::SessionKeyUnavailable)
        ));
        assert!(matches!(
            manager.encrypt_file(b"x", &ChunkOptions::new()).await,
            Err(Error::SessionKeyUnavailable)
        ));
        assert!(matches!(
            manager.receive_file_key(&[0u8; 256]),
            Err(Error::SessionKeyUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_register_empty_password_returns_to_anonymous() {
        let mut manager = manager();
        assert!(matches!(
            manager.register("").await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(manager.state(), AccountState::Anonymous);
        assert!(manager.stored_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_then_register_again_rejected() {
        let mut manager = manager();
        manager.register("pw").await.unwrap();
        assert!(matches!(
            manager.register("pw").await,
            Err(Error::InvalidState(_))
        ));
        assert_eq!(manager.state(), AccountState::Authenticated);
    }

    #[tokio::test]
    async fn test_restore_without_record_stays_anonymous() {
        let mut manager = manager();
        assert!(!manager.restore().await.unwrap());
        assert_eq!(manager.state(), AccountState::Anonymous);
    }

    #[tokio::test]
    async fn test_incompatible_record_rejected() {
        let mut manager = manager();
        let mut record = manager.register("pw").await.unwrap();
        manager.logout().await.unwrap();

        record.version = RecordVersion { major: 2, minor: 0 };
        assert!(matches!(
            manager.login("pw", &record).await,
            Err(Error::InvalidState(_))
        ));
        assert_eq!(manager.state(), AccountState::Anonymous);
    }

    #[tokio::test]
    async fn test_swapped_public_key_rejected() {
        let mut first = manager();
        let record = first.register("pw").await.unwrap();
        let mut second = manager();
        let other = second.register("pw").await.unwrap();

        let mut mixed = record.clone();
        mixed.public_key = other.public_key;

        let mut fresh = manager();
        assert!(matches!(
            fresh.login("pw", &mixed).await,
            Err(Error::Decryption)
        ));
    }
}
