pub mod http;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use crate::cli::Args;
use crate::error::ChatError;
use crate::models::chat::HistoryMessage;
use crate::models::stream::ChatRequest;
use self::http::HttpChatService;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChatError>> + Send>>;

/// The remote chat service. Every call is a single attempt.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Opens the chat stream. Fails before returning if the request cannot be
    /// sent or the status is not 2xx.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryMessage>, ChatError>;
}

pub fn new_service(args: &Args) -> Result<Arc<dyn ChatService>, ChatError> {
    let service = HttpChatService::new(&args.base_url)?;
    Ok(Arc::new(service))
}
