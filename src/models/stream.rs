use serde::{ Serialize, Deserialize };

/// Body posted to the chat stream endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub user_name: String,
    pub phone: String,
}

/// One `data: ` line of the chat stream.
#[derive(Clone, Debug, Deserialize)]
pub struct StreamPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecoderEvent {
    /// Cumulative text received so far on this stream.
    Chunk(String),
    End,
    Error(String),
}
