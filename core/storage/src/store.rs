//! Key-value store trait definition.

use async_trait::async_trait;

use zerokey_common::Result;

/// Persistent string key-value store for account records.
///
/// The account layer writes several related keys at once (a wrapped
/// master key and the salt it was derived with must never disagree), so
/// multi-key writes go through [`put_all`](KeyValueStore::put_all), which
/// implementations must apply all-or-nothing.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Backend name (e.g. "memory", "local").
    fn name(&self) -> &str;

    /// Read a value. Absent keys return `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write every entry or none of them.
    ///
    /// # Postconditions
    /// - On `Ok`, every key reads back its new value
    /// - On `Err`, every key still reads back its previous value
    ///
    /// # Errors
    /// - `Storage` or `Io` if the backend could not persist the batch
    async fn put_all(&self, entries: Vec<(String, String)>) -> Result<()>;

    /// Remove the given keys. Missing keys are ignored.
    async fn remove_all(&self, keys: &[String]) -> Result<()>;

    /// All keys currently stored, sorted.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Write a single entry.
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_all(vec![(key.to_string(), value.to_string())]).await
    }

    /// Whether a key is present.
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
