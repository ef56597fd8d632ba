use async_trait::async_trait;
use ::redis::{ AsyncCommands, Client };
use crate::error::ChatError;
use super::KeyValueStore;

pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    pub fn new(url: &str) -> Result<Self, ChatError> {
        Ok(Self {
            client: Client::open(url)?,
        })
    }

    async fn get_connection(&self) -> Result<::redis::aio::MultiplexedConnection, ::redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let mut conn = self.get_connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        assert!(matches!(RedisStore::new("not-a-redis-url"), Err(ChatError::Storage(_))));
    }
}
