use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use crate::error::ChatError;
use super::KeyValueStore;

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
