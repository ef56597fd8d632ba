mod reducer;

pub use self::reducer::{ apply, new_session_id, ERROR_MARKER };

use crate::models::chat::{ HistoryMessage, Message, Role, Session };
use crate::models::stream::DecoderEvent;

pub const DEFAULT_TITLE_LENGTH: usize = 30;

/// Identifies one network operation started by the reducer. Results
/// carrying any other id than the one in flight are dropped.
pub type RequestId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CopyStatus {
    #[default]
    Idle,
    Copied,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConversationState {
    pub session_id: String,
    pub messages: Vec<Message>,
    /// Most recent first.
    pub sessions: Vec<Session>,
    pub has_started: bool,
    pub in_flight: Option<RequestId>,
    pub copy_status: CopyStatus,
    /// Finished copy attempts, so repeated results with the same status can be told apart.
    pub copies: u64,
    pub title_length: usize,
    next_request: RequestId,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>, title_length: usize) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            sessions: Vec::new(),
            has_started: false,
            in_flight: None,
            copy_status: CopyStatus::Idle,
            copies: 0,
            title_length,
            next_request: 1,
        }
    }

    pub fn loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_streaming())
    }

    pub fn latest_reply(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.content.is_empty())
    }

    pub fn is_current(&self, request: RequestId) -> bool {
        self.in_flight == Some(request)
    }

    fn issue_request(&mut self) -> RequestId {
        let request = self.next_request;
        self.next_request += 1;
        self.in_flight = Some(request);
        request
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Replaces the session list with what was persisted earlier.
    RestoreSessions(Vec<Session>),
    StartSession,
    SubmitUserMessage(String),
    OnChunk {
        request: RequestId,
        text: String,
    },
    OnStreamEnd {
        request: RequestId,
    },
    OnStreamError {
        request: RequestId,
        reason: String,
    },
    LoadSession(String),
    HistoryLoaded {
        request: RequestId,
        messages: Vec<HistoryMessage>,
    },
    HistoryFailed {
        request: RequestId,
        reason: String,
    },
    DeleteSession(String),
    CopyMessage(String),
    CopyFinished(bool),
}

impl Action {
    pub fn from_decoder(request: RequestId, event: DecoderEvent) -> Self {
        match event {
            DecoderEvent::Chunk(text) => Action::OnChunk { request, text },
            DecoderEvent::End => Action::OnStreamEnd { request },
            DecoderEvent::Error(reason) => Action::OnStreamError { request, reason },
        }
    }

    /// The request a network result belongs to, if this is one.
    pub fn request(&self) -> Option<RequestId> {
        match self {
            | Action::OnChunk { request, .. }
            | Action::OnStreamEnd { request }
            | Action::OnStreamError { request, .. }
            | Action::HistoryLoaded { request, .. }
            | Action::HistoryFailed { request, .. } => Some(*request),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    StreamChat {
        request: RequestId,
        session_id: String,
        message: String,
    },
    FetchHistory {
        request: RequestId,
        session_id: String,
    },
    PersistSessions(Vec<Session>),
    Copy(String),
    Cancel(RequestId),
}
