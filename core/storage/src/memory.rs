//! In-memory key-value store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::KeyValueStore;
use zerokey_common::{Error, Result};

/// In-memory key-value store.
///
/// Useful for tests and ephemeral sessions. Clones share the same map, so a
/// test can keep a handle and inspect what the account layer persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>> {
        self.entries
            .read()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.entries
            .write()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn put_all(&self, entries: Vec<(String, String)>) -> Result<()> {
        // Single write lock: readers see the whole batch or none of it.
        let mut map = self.write()?;
        map.extend(entries);
        Ok(())
    }

    async fn remove_all(&self, keys: &[String]) -> Result<()> {
        let mut map = self.write()?;
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.read()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryStore::new();
        store.put("a", "1").await.unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert!(store.contains("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_all_overwrites() {
        let store = MemoryStore::new();
        store.put("a", "old").await.unwrap();
        store
            .put_all(vec![
                ("a".to_string(), "new".to_string()),
                ("b".to_string(), "2".to_string()),
            ])
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_remove_all_ignores_missing() {
        let store = MemoryStore::new();
        store.put("a", "1").await.unwrap();
        store
            .remove_all(&["a".to_string(), "never".to_string()])
            .await
            .unwrap();

        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.put("k", "v").await.unwrap();

        assert_eq!(handle.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(handle.name(), "memory");
    }
}
