use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{ Path, PathBuf };
use tokio::fs;
use crate::error::ChatError;
use super::KeyValueStore;

/// All keys live in one JSON object on disk. Writes go to a temporary
/// sibling file which is then renamed over the original.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, ChatError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        // a corrupt file is replaced rather than blocking every later write
        let mut entries = match self.read_all().await {
            Ok(entries) => entries,
            Err(ChatError::Parse(_)) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&entries)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
