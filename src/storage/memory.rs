//! In-memory storage for isolated sessions.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::storage::{StorageBackend, StorageError};

/// Volatile backend; clones share the same map, separate instances never do.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<DashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        if value.is_null() {
            self.inner.remove(key);
        } else {
            self.inner.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instances_are_isolated() {
        let a = MemoryStorage::new();
        let b = MemoryStorage::new();

        a.save("nonce", &json!(7)).unwrap();
        assert_eq!(a.load("nonce").unwrap(), Some(json!(7)));
        assert!(b.load("nonce").unwrap().is_none());

        // Clones share
        let a2 = a.clone();
        assert_eq!(a2.load("nonce").unwrap(), Some(json!(7)));
        a2.save("nonce", &Value::Null).unwrap();
        assert!(a.is_empty());
    }
}
