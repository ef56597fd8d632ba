use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::collections::{ HashMap, VecDeque };
use std::sync::Arc;
use tokio::sync::{ mpsc, watch };
use tokio::task::AbortHandle;

use crate::client::ChatService;
use crate::clipboard::Clipboard;
use crate::models::stream::ChatRequest;
use crate::state::{ apply, new_session_id, Action, ConversationState, Effect, RequestId };
use crate::store::SessionRepository;
use crate::stream::decode_stream;

#[derive(Clone, Debug)]
pub struct UserProfile {
    pub user_name: String,
    pub phone: String,
}

/// Owns the conversation state and is the only place it is written.
///
/// Network work runs in spawned tasks that report back through a channel;
/// their results are applied here, one at a time, in arrival order.
pub struct ChatController {
    state: ConversationState,
    service: Arc<dyn ChatService>,
    sessions: SessionRepository,
    clipboard: Arc<dyn Clipboard>,
    profile: UserProfile,
    results_tx: mpsc::UnboundedSender<Action>,
    results_rx: mpsc::UnboundedReceiver<Action>,
    tasks: HashMap<RequestId, AbortHandle>,
    snapshots: watch::Sender<ConversationState>,
}

impl ChatController {
    /// Restores the persisted session list and opens a fresh session.
    pub async fn start(
        service: Arc<dyn ChatService>,
        sessions: SessionRepository,
        clipboard: Arc<dyn Clipboard>,
        profile: UserProfile,
        title_length: usize
    ) -> Self {
        let restored = sessions.load().await;
        info!("Restored {} saved session(s)", restored.len());

        let session_id = new_session_id(restored.iter().map(|s| s.id.as_str()));
        let state = ConversationState::new(session_id, title_length);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(state.clone());

        let mut controller = Self {
            state,
            service,
            sessions,
            clipboard,
            profile,
            results_tx,
            results_rx,
            tasks: HashMap::new(),
            snapshots,
        };
        controller.dispatch(Action::RestoreSessions(restored)).await;
        controller
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.snapshots.subscribe()
    }

    pub async fn dispatch(&mut self, action: Action) {
        let mut queue = VecDeque::from([action]);
        while let Some(action) = queue.pop_front() {
            if let Some(request) = action.request() {
                if !self.state.is_current(request) {
                    debug!("Dropping result for abandoned request {}", request);
                    continue;
                }
            }

            let (next, effects) = apply(&self.state, action);
            self.state = next;
            self.snapshots.send_replace(self.state.clone());

            for effect in effects {
                if let Some(follow_up) = self.run_effect(effect).await {
                    queue.push_back(follow_up);
                }
            }
            self.prune_tasks();
        }
    }

    /// Waits for the next result reported by a background task.
    pub async fn next_result(&mut self) -> Option<Action> {
        self.results_rx.recv().await
    }

    /// Applies background results until no request is in flight.
    pub async fn run_until_idle(&mut self) {
        while self.state.loading() {
            match self.next_result().await {
                Some(action) => self.dispatch(action).await,
                None => {
                    break;
                }
            }
        }
    }

    async fn run_effect(&mut self, effect: Effect) -> Option<Action> {
        match effect {
            Effect::StreamChat { request, session_id, message } => {
                let payload = ChatRequest {
                    session_id,
                    message,
                    user_name: self.profile.user_name.clone(),
                    phone: self.profile.phone.clone(),
                };
                self.spawn_stream(request, payload);
                None
            }
            Effect::FetchHistory { request, session_id } => {
                self.spawn_history(request, session_id);
                None
            }
            Effect::PersistSessions(sessions) => {
                if let Err(e) = self.sessions.save(&sessions).await {
                    warn!("Failed to persist session list: {}", e);
                }
                None
            }
            Effect::Copy(text) => {
                let copied = match self.clipboard.copy(&text) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Copy failed: {}", e);
                        false
                    }
                };
                Some(Action::CopyFinished(copied))
            }
            Effect::Cancel(request) => {
                if let Some(handle) = self.tasks.remove(&request) {
                    handle.abort();
                    info!("Abandoned request {}", request);
                }
                None
            }
        }
    }

    fn spawn_stream(&mut self, request: RequestId, payload: ChatRequest) {
        let service = self.service.clone();
        let tx = self.results_tx.clone();
        info!("Request {}: streaming reply for session {}", request, payload.session_id);

        let handle = tokio::spawn(async move {
            let bytes = match service.stream_chat(&payload).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Request {}: chat stream failed: {}", request, e);
                    let _ = tx.send(Action::OnStreamError { request, reason: e.to_string() });
                    return;
                }
            };

            let mut events = Box::pin(decode_stream(bytes));
            while let Some(event) = events.next().await {
                if tx.send(Action::from_decoder(request, event)).is_err() {
                    return;
                }
            }
            debug!("Request {}: stream closed", request);
        });
        self.tasks.insert(request, handle.abort_handle());
    }

    fn spawn_history(&mut self, request: RequestId, session_id: String) {
        let service = self.service.clone();
        let tx = self.results_tx.clone();
        info!("Request {}: loading history for session {}", request, session_id);

        let handle = tokio::spawn(async move {
            let action = match service.fetch_history(&session_id).await {
                Ok(messages) => Action::HistoryLoaded { request, messages },
                Err(e) => {
                    warn!("Request {}: history for {} unavailable: {}", request, session_id, e);
                    Action::HistoryFailed { request, reason: e.to_string() }
                }
            };
            let _ = tx.send(action);
        });
        self.tasks.insert(request, handle.abort_handle());
    }

    fn prune_tasks(&mut self) {
        let active = self.state.in_flight;
        self.tasks.retain(|request, _| Some(*request) == active);
    }
}
