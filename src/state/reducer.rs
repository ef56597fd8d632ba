use chrono::Utc;
use uuid::Uuid;

use super::{ Action, ConversationState, CopyStatus, Effect };
use crate::models::chat::{ HistoryMessage, Message, MessageStatus, Role, Session };

pub const ERROR_MARKER: &str = "⚠️ Connection error.";

/// Time-based session id that differs from every id in `taken`.
pub fn new_session_id<'a>(taken: impl Iterator<Item = &'a str> + Clone) -> String {
    let mut millis = Utc::now().timestamp_millis();
    loop {
        let candidate = format!("session_{}", millis);
        if !taken.clone().any(|id| id == candidate) {
            return candidate;
        }
        millis += 1;
    }
}

/// Computes the next state and the side effects it asks for. The input
/// state is left untouched.
pub fn apply(state: &ConversationState, action: Action) -> (ConversationState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match action {
        Action::RestoreSessions(sessions) => {
            next.sessions = dedup_sessions(sessions);
        }
        Action::StartSession => start_session(&mut next, &mut effects),
        Action::SubmitUserMessage(text) => {
            if text.trim().is_empty() || state.loading() {
                return (next, effects);
            }
            next.copy_status = CopyStatus::Idle;
            next.messages.push(Message::user(Uuid::new_v4().to_string(), text.clone()));

            next.has_started = true;
            // listed once, on the first message the session sees here
            if !next.sessions.iter().any(|s| s.id == next.session_id) {
                let title: String = text.chars().take(next.title_length).collect();
                next.sessions.insert(0, Session { id: next.session_id.clone(), title });
                effects.push(Effect::PersistSessions(next.sessions.clone()));
            }

            next.messages.push(Message::placeholder(Uuid::new_v4().to_string()));
            let request = next.issue_request();
            effects.push(Effect::StreamChat {
                request,
                session_id: next.session_id.clone(),
                message: text,
            });
        }
        Action::OnChunk { request, text } => {
            if !state.is_current(request) {
                return (next, effects);
            }
            if let Some(reply) = pending_reply(&mut next) {
                reply.content = text;
            }
        }
        Action::OnStreamEnd { request } => {
            if !state.is_current(request) {
                return (next, effects);
            }
            next.in_flight = None;
            if let Some(reply) = pending_reply(&mut next) {
                reply.status = MessageStatus::Complete;
            }
        }
        Action::OnStreamError { request, .. } => {
            if !state.is_current(request) {
                return (next, effects);
            }
            next.in_flight = None;
            if let Some(reply) = pending_reply(&mut next) {
                if reply.content.is_empty() {
                    reply.content = ERROR_MARKER.to_string();
                }
                reply.status = MessageStatus::Failed;
            }
        }
        Action::LoadSession(session_id) => {
            if state.loading() {
                return (next, effects);
            }
            next.session_id = session_id.clone();
            next.copy_status = CopyStatus::Idle;
            let request = next.issue_request();
            effects.push(Effect::FetchHistory { request, session_id });
        }
        Action::HistoryLoaded { request, messages } => {
            if !state.is_current(request) {
                return (next, effects);
            }
            next.in_flight = None;
            next.messages = history_to_messages(messages);
            next.has_started = true;
        }
        Action::HistoryFailed { request, .. } => {
            if !state.is_current(request) {
                return (next, effects);
            }
            next.in_flight = None;
            next.messages.clear();
            next.has_started = false;
        }
        Action::DeleteSession(session_id) => {
            let before = next.sessions.len();
            next.sessions.retain(|s| s.id != session_id);
            if next.sessions.len() != before {
                effects.push(Effect::PersistSessions(next.sessions.clone()));
            }
            if session_id == state.session_id {
                start_session(&mut next, &mut effects);
            }
        }
        Action::CopyMessage(message_id) => {
            let target = next.messages
                .iter()
                .find(|m| m.id == message_id && m.role == Role::Assistant && !m.content.is_empty());
            if let Some(message) = target {
                effects.push(Effect::Copy(message.content.clone()));
            }
        }
        Action::CopyFinished(ok) => {
            next.copy_status = if ok { CopyStatus::Copied } else { CopyStatus::Failed };
            next.copies += 1;
        }
    }

    (next, effects)
}

fn start_session(next: &mut ConversationState, effects: &mut Vec<Effect>) {
    if let Some(request) = next.in_flight.take() {
        effects.push(Effect::Cancel(request));
    }
    let taken = std::iter::once(next.session_id.as_str())
        .chain(next.sessions.iter().map(|s| s.id.as_str()));
    next.session_id = new_session_id(taken);
    next.messages.clear();
    next.has_started = false;
    next.copy_status = CopyStatus::Idle;
}

fn pending_reply(state: &mut ConversationState) -> Option<&mut Message> {
    state.messages
        .iter_mut()
        .rev()
        .find(|m| m.role == Role::Assistant && m.is_streaming())
}

fn dedup_sessions(sessions: Vec<Session>) -> Vec<Session> {
    let mut out: Vec<Session> = Vec::with_capacity(sessions.len());
    for session in sessions {
        if !out.iter().any(|s| s.id == session.id) {
            out.push(session);
        }
    }
    out
}

fn history_to_messages(history: Vec<HistoryMessage>) -> Vec<Message> {
    let loaded_at = Utc::now();
    history
        .into_iter()
        .filter_map(|entry| {
            let role = entry.role.parse::<Role>().ok()?;
            let created_at = entry.timestamp
                .as_ref()
                .and_then(|ts| ts.to_datetime())
                .unwrap_or(loaded_at);
            Some((role, entry.content, created_at))
        })
        .enumerate()
        .map(|(i, (role, content, created_at))| Message {
            id: format!("hist-{}", i),
            role,
            content,
            created_at,
            status: MessageStatus::Complete,
        })
        .collect()
}
