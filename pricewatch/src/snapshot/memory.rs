use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::snapshot::port::KeyValueCache;

/// Process-local cache; the default for tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryKeyValueCache {
    map: Mutex<HashMap<String, String>>,
}

impl InMemoryKeyValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueCache for InMemoryKeyValueCache {
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let map = self.map.lock();
        Ok(keys.iter().map(|k| map.get(k).cloned()).collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.map.lock().insert(key.to_string(), value);
        Ok(())
    }
}
