//! Registry of live chat sessions
//!
//! Sessions live only in memory. Two bounds keep the map from growing without
//! limit: a periodic sweep drops sessions nobody has touched for a while, and
//! creating a session past the cap evicts the least recently active one.
//! A session that is awaiting a reply or has an attached event stream is
//! never swept, and is only evicted by the cap when nothing else is left.

use crate::chat::{ChatSession, ResponseRequester, SessionSummary};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Manager for all chat sessions held by this process
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<ChatSession>>>,
    system_instruction: String,
    requester: ResponseRequester,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(system_instruction: String, requester: ResponseRequester) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            system_instruction,
            requester,
            max_sessions: usize::MAX,
        }
    }

    /// Cap the number of live sessions (at least one is always allowed)
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn model_id(&self) -> &str {
        self.requester.model_id()
    }

    /// Start a new session seeded with the system instruction
    pub async fn create(&self) -> Arc<ChatSession> {
        let id = Uuid::new_v4();
        let session = Arc::new(ChatSession::new(
            id,
            &self.system_instruction,
            self.requester.clone(),
        ));

        let mut sessions = self.sessions.write().await;
        while sessions.len() >= self.max_sessions {
            let Some(victim) = eviction_candidate(&sessions) else {
                break;
            };
            sessions.remove(&victim);
            tracing::warn!(
                session = %victim,
                limit = self.max_sessions,
                "Session limit reached, evicted least recently active"
            );
        }
        sessions.insert(id, Arc::clone(&session));
        drop(sessions);

        tracing::info!(session = %id, "Session created");
        session
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<ChatSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Summaries of every session, oldest first
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(session.summary().await);
        }
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    /// Forget a session. An exchange already in flight still completes.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "Session removed");
        }
        removed
    }

    /// Drop every session idle for at least `max_idle`, returning how many went
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.is_awaiting_response()
                || session.has_subscribers()
                || session.idle_for() < max_idle;
            if !keep {
                tracing::info!(
                    session = %id,
                    idle_secs = session.idle_for().as_secs(),
                    "Idle session evicted"
                );
            }
            keep
        });
        before - sessions.len()
    }

    /// Sweep idle sessions in the background until the manager is dropped
    pub fn spawn_idle_sweeper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = (max_idle / 2).clamp(MIN_SWEEP_PERIOD, MAX_SWEEP_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let evicted = manager.evict_idle(max_idle).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Idle sweep finished");
                }
            }
        })
    }
}

/// Least recently active session, preferring ones that are neither awaiting
/// a reply nor being watched
fn eviction_candidate(sessions: &HashMap<Uuid, Arc<ChatSession>>) -> Option<Uuid> {
    sessions
        .values()
        .min_by_key(|s| {
            (
                s.is_awaiting_response() || s.has_subscribers(),
                s.last_active(),
            )
        })
        .map(|s| s.id())
}
