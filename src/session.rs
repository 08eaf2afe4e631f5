use crate::error::{Action, ConsoleError};
use crate::model::{ConversationState, ProfileEntry, Speaker, TranscriptEntry, Turn};
use crate::proxy::{ConverseRequest, ConverseResponse, DialogProxy, ProfileRequest};
use crate::registry::DialogRegistry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Owner of the single active conversation.
///
/// Starts and turns each take a ticket from their own increasing counter.
/// When a call completes after a newer one of the same kind was issued its
/// result is dropped with [`ConsoleError::Superseded`], so overlapping
/// requests resolve as "last request wins". A turn is also dropped when a
/// start succeeded while it was in flight; a start that fails leaves turns on
/// the active conversation untouched.
#[derive(Clone)]
pub struct ConversationSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    proxy: Arc<dyn DialogProxy>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    current: Option<ConversationState>,
    transcript: Vec<TranscriptEntry>,
    latest_start: u64,
    latest_turn: u64,
    /// Bumped by every successful start
    generation: u64,
}

impl SessionState {
    fn issue_start(&mut self) -> u64 {
        self.latest_start += 1;
        self.latest_start
    }

    fn issue_turn(&mut self) -> u64 {
        self.latest_turn += 1;
        self.latest_turn
    }
}

/// Reply to a user turn, with the profile refresh it triggered
pub struct TurnReply {
    pub turn: Turn,
    /// Resolves to the updated profile, or `None` when the fetch failed
    pub profile: JoinHandle<Option<Vec<ProfileEntry>>>,
}

fn to_turn(response: &ConverseResponse) -> Turn {
    Turn {
        lines: response.lines().to_vec(),
        default_answer_used: response.default_answer_used(),
    }
}

impl ConversationSession {
    pub fn new(proxy: Arc<dyn DialogProxy>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                proxy,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Option<ConversationState> {
        self.lock().current.clone()
    }

    pub fn dialog_id(&self) -> Option<String> {
        self.lock().current.as_ref().map(|c| c.dialog_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.lock().current.is_some()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.lock().transcript.clone()
    }

    /// Open a new conversation on a dialog, abandoning any current one.
    ///
    /// A failed start leaves the previous conversation and transcript as they were.
    pub async fn start(&self, dialog_id: &str) -> Result<Turn, ConsoleError> {
        let ticket = self.lock().issue_start();

        let result = self
            .inner
            .proxy
            .converse(dialog_id, &ConverseRequest::opening())
            .await;

        let mut state = self.lock();
        if state.latest_start != ticket {
            tracing::debug!(dialog_id, ticket, "discarding superseded conversation start");
            return Err(ConsoleError::Superseded);
        }
        let response = result.map_err(|e| ConsoleError::from_proxy(Action::Start, e))?;

        let turn = to_turn(&response);
        state.generation += 1;
        state.current = Some(ConversationState {
            dialog_id: dialog_id.to_string(),
            conversation_id: response.conversation_id,
            client_id: response.client_id,
        });
        state.transcript.clear();
        state
            .transcript
            .push(TranscriptEntry::new(Speaker::Bot, turn.joined()));

        tracing::info!(
            dialog_id,
            conversation_id = ?state.current.as_ref().map(|c| &c.conversation_id),
            "conversation started"
        );
        Ok(turn)
    }

    /// Resolve a display index through the registry, then start on that dialog
    pub async fn start_at(&self, registry: &DialogRegistry, index: usize) -> Result<Turn, ConsoleError> {
        let dialog = registry.get(index)?;
        self.start(&dialog.dialog_id).await
    }

    /// Send one user input on the active conversation.
    ///
    /// On success a profile fetch is spawned alongside; its handle is returned
    /// but nothing waits on it.
    pub async fn send_turn(&self, input: &str) -> Result<TurnReply, ConsoleError> {
        let (conversation, ticket, generation) = {
            let mut state = self.lock();
            let conversation = state.current.clone().ok_or(ConsoleError::NoActiveSession)?;
            let ticket = state.issue_turn();
            state
                .transcript
                .push(TranscriptEntry::new(Speaker::Human, input));
            (conversation, ticket, state.generation)
        };

        let request = ConverseRequest::turn(input, &conversation.conversation_id, &conversation.client_id);
        let result = self
            .inner
            .proxy
            .converse(&conversation.dialog_id, &request)
            .await;

        let turn = {
            let mut state = self.lock();
            if state.latest_turn != ticket || state.generation != generation {
                tracing::debug!(ticket, "discarding superseded turn");
                return Err(ConsoleError::Superseded);
            }
            let response = result.map_err(|e| ConsoleError::from_proxy(Action::Turn, e))?;
            let turn = to_turn(&response);
            state
                .transcript
                .push(TranscriptEntry::new(Speaker::Bot, turn.joined()));
            turn
        };

        if turn.default_answer_used {
            tracing::info!(
                conversation_id = %conversation.conversation_id,
                "dialog answered with its default response"
            );
        }

        let session = self.clone();
        let profile = tokio::spawn(async move { session.fetch_profile().await });
        Ok(TurnReply { turn, profile })
    }

    /// Best-effort fetch of the profile inferred for the active conversation.
    /// Returns `None` with no session, on failure, or when the conversation
    /// changed while the request was in flight.
    pub async fn fetch_profile(&self) -> Option<Vec<ProfileEntry>> {
        let conversation = self.current()?;
        let request = ProfileRequest {
            conversation_id: conversation.conversation_id.clone(),
            client_id: conversation.client_id.clone(),
        };

        let response = match self.inner.proxy.profile(&conversation.dialog_id, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "profile fetch failed");
                return None;
            }
        };

        if self.current().as_ref() != Some(&conversation) {
            tracing::debug!("discarding profile of an abandoned conversation");
            return None;
        }

        Some(
            response
                .name_values
                .into_iter()
                .filter(|entry| !entry.value.is_empty())
                .collect(),
        )
    }
}
