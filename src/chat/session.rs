//! A single chat session: one owned conversation and its submit flow

use super::requester::{ResponseRequester, SENTINEL_REPLY};
use crate::conversation::{
    ConversationObserver, ConversationStore, Message, StoreChange, TranscriptEntry,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("A response is still pending for this session")]
    Busy,
}

/// Result of a submission
#[allow(dead_code)] // Returned by submit, which only tests call directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input: nothing stored, nothing sent
    Ignored,
    /// Raw reply text that was appended (the sentinel on failure)
    Answered { reply: String },
}

/// Change notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Message { entry: TranscriptEntry },
    Reset,
    AwaitingChanged { awaiting: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    /// False once a reset has dropped the system instruction
    pub instruction_present: bool,
    pub awaiting_response: bool,
}

/// Forwards store changes onto the session's event channel
struct EventForwarder {
    tx: broadcast::Sender<SessionEvent>,
}

impl ConversationObserver for EventForwarder {
    fn on_change(&self, change: &StoreChange) {
        let event = match change {
            StoreChange::Appended { index, message } => SessionEvent::Message {
                entry: TranscriptEntry::from_message(*index, message),
            },
            StoreChange::Reset => SessionEvent::Reset,
        };
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

pub struct ChatSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    store: Mutex<ConversationStore>,
    awaiting: AtomicBool,
    last_active: std::sync::Mutex<Instant>,
    requester: ResponseRequester,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatSession {
    pub fn new(id: Uuid, system_instruction: &str, requester: ResponseRequester) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let mut store = ConversationStore::new(system_instruction);
        store.subscribe(Arc::new(EventForwarder { tx: events.clone() }));

        Self {
            id,
            created_at: Utc::now(),
            store: Mutex::new(store),
            awaiting: AtomicBool::new(false),
            last_active: std::sync::Mutex::new(Instant::now()),
            requester,
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting.load(Ordering::Acquire)
    }

    /// Whether an event stream is currently attached
    pub fn has_subscribers(&self) -> bool {
        self.events.receiver_count() > 0
    }

    pub fn last_active(&self) -> Instant {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since the session was last used
    pub fn idle_for(&self) -> Duration {
        self.last_active().elapsed()
    }

    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Run a full exchange: store the input, ask the model, store the reply
    #[allow(dead_code)] // The HTTP layer drives begin/complete itself
    pub async fn submit(self: &Arc<Self>, input: &str) -> Result<SubmitOutcome, ChatError> {
        match self.begin(input).await? {
            None => Ok(SubmitOutcome::Ignored),
            Some(pending) => Ok(SubmitOutcome::Answered {
                reply: pending.complete().await,
            }),
        }
    }

    /// First half of [`submit`](Self::submit).
    ///
    /// Returns `None` for blank input and `Busy` while another exchange is
    /// outstanding; neither touches the store. Otherwise the user message is
    /// stored and the returned exchange holds the awaiting flag until it is
    /// completed or dropped.
    pub async fn begin(
        self: &Arc<Self>,
        input: &str,
    ) -> Result<Option<PendingExchange>, ChatError> {
        if input.trim().is_empty() {
            return Ok(None);
        }

        if self
            .awaiting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChatError::Busy);
        }
        let mut pending = PendingExchange {
            session: Arc::clone(self),
            history: Vec::new(),
        };
        self.touch();
        let _ = self
            .events
            .send(SessionEvent::AwaitingChanged { awaiting: true });

        let mut store = self.store.lock().await;
        store.append(Message::user(input));
        pending.history = store.current().to_vec();
        drop(store);

        tracing::debug!(session = %self.id, messages = pending.history.len(), "Exchange started");
        Ok(Some(pending))
    }

    /// Clear the conversation, system instruction included
    pub async fn reset(&self) {
        self.store.lock().await.reset();
        self.touch();
        tracing::info!(session = %self.id, "Conversation reset");
    }

    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.touch();
        self.store.lock().await.transcript()
    }

    /// Full conversation as sent to the model
    #[allow(dead_code)] // Used in tests
    pub async fn messages(&self) -> Vec<Message> {
        self.store.lock().await.current().to_vec()
    }

    pub async fn summary(&self) -> SessionSummary {
        let (message_count, instruction_present) = {
            let store = self.store.lock().await;
            (store.len(), store.has_instruction())
        };
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            message_count,
            instruction_present,
            awaiting_response: self.is_awaiting_response(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// An exchange whose user message is stored and whose reply is outstanding
pub struct PendingExchange {
    session: Arc<ChatSession>,
    history: Vec<Message>,
}

impl PendingExchange {
    /// Conversation snapshot that will be sent
    #[allow(dead_code)] // Used in tests
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Request the reply and append it; failures append the sentinel.
    pub async fn complete(self) -> String {
        let session = &self.session;

        let reply = match session.requester.request(&self.history).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    session = %session.id,
                    kind = %e.kind,
                    error = %e.message,
                    "Response request failed, storing placeholder"
                );
                SENTINEL_REPLY.to_string()
            }
        };

        session.store.lock().await.append(Message::model(reply.clone()));
        session.touch();
        reply
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        self.session.awaiting.store(false, Ordering::Release);
        let _ = self
            .session
            .events
            .send(SessionEvent::AwaitingChanged { awaiting: false });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Origin;
    use crate::llm::testing::MockLlmService;
    use crate::llm::{LlmError, LlmResponse};

    fn session_with(mock: &Arc<MockLlmService>) -> Arc<ChatSession> {
        let requester = ResponseRequester::new(mock.clone(), true);
        Arc::new(ChatSession::new(Uuid::new_v4(), "system rules", requester))
    }

    #[tokio::test]
    async fn test_submit_appends_user_and_model() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("notes ⸘Hello!⸘");
        let session = session_with(&mock);

        let outcome = session.submit("hi").await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Answered {
                reply: "notes ⸘Hello!⸘".to_string()
            }
        );

        let messages = session.messages().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::user("hi"));
        assert_eq!(messages[2], Message::model("notes ⸘Hello!⸘"));

        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].text, "Hello!");
        assert!(!session.is_awaiting_response());
    }

    #[tokio::test]
    async fn test_request_includes_instruction_and_new_input() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("one");
        mock.queue_text("two");
        let session = session_with(&mock);

        session.submit("first").await.unwrap();
        session.submit("second").await.unwrap();

        let requests = mock.recorded_requests();
        assert_eq!(requests.len(), 2);
        let texts: Vec<_> = requests[1].messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["system rules", "first", "one", "second"]);
    }

    #[tokio::test]
    async fn test_store_grows_by_two_per_round() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let session = session_with(&mock);

        for round in 0..5 {
            if round % 2 == 0 {
                mock.queue_text("ok");
            } else {
                mock.queue_error(LlmError::network("flaky"));
            }
            session.submit(&format!("message {round}")).await.unwrap();
        }

        assert_eq!(session.messages().await.len(), 1 + 2 * 5);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let session = session_with(&mock);

        for input in ["", "   ", "\n\t "] {
            assert_eq!(session.submit(input).await.unwrap(), SubmitOutcome::Ignored);
        }

        assert_eq!(session.messages().await.len(), 1);
        assert!(mock.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_input_is_stored_as_typed() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("ok");
        let session = session_with(&mock);

        session.submit("  padded  ").await.unwrap();
        assert_eq!(session.messages().await[1].text(), "  padded  ");
    }

    #[tokio::test]
    async fn test_failure_appends_sentinel() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_error(LlmError::network("connection refused"));
        let session = session_with(&mock);

        let outcome = session.submit("hello?").await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Answered {
                reply: SENTINEL_REPLY.to_string()
            }
        );

        let messages = session.messages().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].origin(), Origin::Model);
        assert_eq!(messages[2].text(), "null");
        assert!(!session.is_awaiting_response());
    }

    #[tokio::test]
    async fn test_reply_without_text_appends_sentinel() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_response(LlmResponse::default());
        let session = session_with(&mock);

        session.submit("hello").await.unwrap();
        assert_eq!(session.messages().await[2].text(), "null");
    }

    #[tokio::test]
    async fn test_second_submission_while_awaiting_is_busy() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("done");
        let session = session_with(&mock);

        let pending = session.begin("first").await.unwrap().unwrap();
        assert!(session.is_awaiting_response());
        assert_eq!(pending.history().len(), 2);

        assert_eq!(session.submit("second").await.unwrap_err(), ChatError::Busy);
        assert_eq!(session.messages().await.len(), 2);

        pending.complete().await;
        assert!(!session.is_awaiting_response());
        assert_eq!(session.messages().await.len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_exchange_releases_flag() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let session = session_with(&mock);

        let pending = session.begin("first").await.unwrap().unwrap();
        drop(pending);

        assert!(!session.is_awaiting_response());
        assert!(mock.recorded_requests().is_empty());
        // The user message stays; no reply was requested
        assert_eq!(session.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_drops_instruction() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("ok");
        mock.queue_text("after");
        let session = session_with(&mock);

        session.submit("hi").await.unwrap();
        session.reset().await;
        assert!(session.messages().await.is_empty());

        session.submit("again").await.unwrap();
        let requests = mock.recorded_requests();
        let texts: Vec<_> = requests[1].messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["again"]);
        assert_eq!(session.transcript().await.len(), 2);
    }

    #[tokio::test]
    async fn test_events_follow_exchange() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("⸘pong⸘");
        let session = session_with(&mock);
        let mut rx = session.subscribe_events();

        session.submit("ping").await.unwrap();
        session.reset().await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                SessionEvent::AwaitingChanged { awaiting: true },
                SessionEvent::Message {
                    entry: TranscriptEntry {
                        index: 1,
                        origin: Origin::User,
                        text: "ping".to_string()
                    }
                },
                SessionEvent::Message {
                    entry: TranscriptEntry {
                        index: 2,
                        origin: Origin::Model,
                        text: "pong".to_string()
                    }
                },
                SessionEvent::AwaitingChanged { awaiting: false },
                SessionEvent::Reset,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_tracking() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("ok");
        let session = session_with(&mock);
        assert_eq!(session.idle_for(), Duration::ZERO);

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(session.idle_for(), Duration::from_secs(90));

        session.submit("hi").await.unwrap();
        assert_eq!(session.idle_for(), Duration::ZERO);

        tokio::time::advance(Duration::from_secs(5)).await;
        session.reset().await;
        assert_eq!(session.idle_for(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_subscribers_are_counted() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let session = session_with(&mock);
        assert!(!session.has_subscribers());

        let rx = session.subscribe_events();
        assert!(session.has_subscribers());
        drop(rx);
        assert!(!session.has_subscribers());
    }

    #[tokio::test]
    async fn test_summary() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("ok");
        let session = session_with(&mock);
        session.submit("hi").await.unwrap();

        let summary = session.summary().await;
        assert_eq!(summary.id, session.id());
        assert_eq!(summary.message_count, 3);
        assert!(summary.instruction_present);
        assert!(!summary.awaiting_response);

        session.reset().await;
        let summary = session.summary().await;
        assert_eq!(summary.message_count, 0);
        assert!(!summary.instruction_present);
    }
}
