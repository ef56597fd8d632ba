use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ChatError::Parse(e.to_string())
        } else {
            ChatError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for ChatError {
    fn from(e: std::io::Error) -> Self {
        ChatError::Storage(e.to_string())
    }
}

impl From<redis::RedisError> for ChatError {
    fn from(e: redis::RedisError) -> Self {
        ChatError::Storage(e.to_string())
    }
}

impl From<url::ParseError> for ChatError {
    fn from(e: url::ParseError) -> Self {
        ChatError::Config(e.to_string())
    }
}
