mod file;
mod memory;
mod redis;

pub use self::file::FileStore;
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use log::{ info, warn };
use std::sync::Arc;
use crate::cli::Args;
use crate::error::ChatError;
use crate::models::chat::Session;

/// String key-value persistence, the stand-in for browser local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ChatError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), ChatError>;
}

pub fn create_store(args: &Args) -> Result<Arc<dyn KeyValueStore>, ChatError> {
    match args.store_type.to_lowercase().as_str() {
        "file" => {
            info!("Session list will be stored in file {}", args.store_path);
            Ok(Arc::new(FileStore::new(&args.store_path)))
        }
        "redis" => {
            info!("Session list will be stored in redis at {}", args.redis_url);
            Ok(Arc::new(RedisStore::new(&args.redis_url)?))
        }
        "memory" => {
            warn!("Session list is kept in memory only and will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => Err(ChatError::Config(format!("Unsupported session store type: {}", other))),
    }
}

/// Reads and writes the ordered session list under a single key.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    /// Missing or unreadable data is treated as an empty list.
    pub async fn load(&self) -> Vec<Session> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return Vec::new();
            }
            Err(e) => {
                warn!("Could not read session list '{}': {}", self.key, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Session>>(&raw) {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Ignoring corrupt session list '{}': {}", self.key, e);
                Vec::new()
            }
        }
    }

    pub async fn save(&self, sessions: &[Session]) -> Result<(), ChatError> {
        let json = serde_json::to_string(sessions)?;
        self.store.set(&self.key, &json).await
    }
}
