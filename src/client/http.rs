use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, StatusCode, header::{ HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE } };
use url::Url;

use super::{ ByteStream, ChatService };
use crate::error::ChatError;
use crate::models::chat::{ Conversation, HistoryMessage };
use crate::models::stream::ChatRequest;

const STREAM_ROUTE: &str = "api/chat/stream";
const HISTORY_ROUTE: &str = "api/chat/history/";

pub struct HttpChatService {
    http: HttpClient,
    base_url: Url,
}

impl HttpChatService {
    pub fn new(base_url: &str) -> Result<Self, ChatError> {
        let mut base = Url::parse(base_url.trim())?;
        if base.cannot_be_a_base() {
            return Err(ChatError::Config(format!("'{}' cannot be used as a base URL", base_url)));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self { http, base_url: base })
    }

    pub fn stream_url(&self) -> Result<Url, ChatError> {
        Ok(self.base_url.join(STREAM_ROUTE)?)
    }

    pub fn history_url(&self, session_id: &str) -> Result<Url, ChatError> {
        let mut url = self.base_url.join(HISTORY_ROUTE)?;
        url.path_segments_mut()
            .map_err(|_| ChatError::Config(format!("Invalid history URL for {}", session_id)))?
            .pop_if_empty()
            .push(session_id);
        Ok(url)
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let url = self.stream_url()?;
        info!("Opening chat stream for session {}", request.session_id);

        let resp = self.http
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChatError::Transport(format!("Chat stream returned HTTP {}", status)));
        }

        let bytes = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|buf| buf.to_vec()).map_err(ChatError::from));
        Ok(Box::pin(bytes))
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryMessage>, ChatError> {
        let url = self.history_url(session_id)?;
        debug!("Fetching history from {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ChatError::NotFound(format!("No history for session {}", session_id)));
        }
        if !status.is_success() {
            return Err(ChatError::Transport(format!("History returned HTTP {}", status)));
        }

        let conversation: Conversation = resp.json().await?;
        Ok(conversation.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::WireTimestamp;

    fn request() -> ChatRequest {
        ChatRequest {
            session_id: "session_42".into(),
            message: "hello".into(),
            user_name: "John Doe".into(),
            phone: "1234567890".into(),
        }
    }

    #[test]
    fn urls_join_onto_base_with_or_without_trailing_slash() {
        let plain = HttpChatService::new("http://localhost:8000").unwrap();
        let nested = HttpChatService::new("http://localhost:8000/proxy").unwrap();

        assert_eq!(plain.stream_url().unwrap().as_str(), "http://localhost:8000/api/chat/stream");
        assert_eq!(nested.stream_url().unwrap().as_str(), "http://localhost:8000/proxy/api/chat/stream");
        assert_eq!(
            plain.history_url("session_1").unwrap().as_str(),
            "http://localhost:8000/api/chat/history/session_1"
        );
        assert_eq!(
            plain.history_url("a/b c").unwrap().as_str(),
            "http://localhost:8000/api/chat/history/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(HttpChatService::new("not a url"), Err(ChatError::Config(_))));
        assert!(matches!(HttpChatService::new("mailto:someone@example.com"), Err(ChatError::Config(_))));
    }

    #[tokio::test]
    async fn stream_chat_posts_request_and_yields_body() {
        let mut server = mockito::Server::new_async().await;
        let body = "data: {\"type\":\"chunk\",\"content\":\"Hi\"}\n\n";
        let mock = server
            .mock("POST", "/api/chat/stream")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(serde_json::to_value(request()).unwrap()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async().await;

        let service = HttpChatService::new(&server.url()).unwrap();
        let mut stream = service.stream_chat(&request()).await.unwrap();
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend(chunk.unwrap());
        }

        mock.assert_async().await;
        assert_eq!(String::from_utf8(received).unwrap(), body);
    }

    #[tokio::test]
    async fn stream_chat_non_success_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat/stream")
            .with_status(502)
            .create_async().await;

        let service = HttpChatService::new(&server.url()).unwrap();
        let result = service.stream_chat(&request()).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ChatError::Transport(_))));
    }

    #[tokio::test]
    async fn fetch_history_returns_ordered_messages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/chat/history/session_42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"messages":[
                    {"role":"user","content":"hi","timestamp":"2024-05-01T10:00:00Z"},
                    {"role":"assistant","content":"hello there","timestamp":1714557601000}
                ]}"#
            )
            .create_async().await;

        let service = HttpChatService::new(&server.url()).unwrap();
        let messages = service.fetch_history("session_42").await.unwrap();

        mock.assert_async().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].content, "hello there");
        assert_eq!(messages[1].timestamp, Some(WireTimestamp::Millis(1_714_557_601_000)));
    }

    #[tokio::test]
    async fn fetch_history_404_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/chat/history/missing")
            .with_status(404)
            .create_async().await;

        let service = HttpChatService::new(&server.url()).unwrap();
        let result = service.fetch_history("missing").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_history_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/chat/history/broken")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async().await;

        let service = HttpChatService::new(&server.url()).unwrap();
        let result = service.fetch_history("broken").await;
        assert!(matches!(result, Err(ChatError::Parse(_))));
    }
}
