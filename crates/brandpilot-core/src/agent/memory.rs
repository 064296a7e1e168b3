//! Per-session conversation memory bounded to the last N turns
//!
//! The number of sessions is capped as well; once full, recording a turn for
//! a new session evicts the session that was least recently active.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

use crate::provider::ChatMessage;

/// One completed exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

struct Session {
    turns: VecDeque<Turn>,
    last_active: u64,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<String, Session>,
    /// Monotonic activity counter
    clock: u64,
}

/// Sliding window of recent turns, kept separately for every session
pub struct ConversationMemory {
    window: usize,
    max_sessions: usize,
    sessions: Mutex<Sessions>,
}

impl ConversationMemory {
    pub fn new(window: usize, max_sessions: usize) -> Self {
        Self {
            window,
            max_sessions,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Record a finished exchange, dropping the oldest turns beyond the window
    pub fn record(&self, session_id: &str, user: impl Into<String>, assistant: impl Into<String>) {
        if self.window == 0 || self.max_sessions == 0 {
            return;
        }
        let mut sessions = self.sessions.lock();
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.by_id.contains_key(session_id) && sessions.by_id.len() >= self.max_sessions {
            let idle = sessions
                .by_id
                .iter()
                .min_by_key(|(_, session)| session.last_active)
                .map(|(id, _)| id.clone());
            if let Some(idle) = idle {
                sessions.by_id.remove(&idle);
                debug!(session_id = %idle, "Evicted least recently active session");
            }
        }

        let session = sessions
            .by_id
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                turns: VecDeque::new(),
                last_active: now,
            });
        session.last_active = now;
        session.turns.push_back(Turn {
            user: user.into(),
            assistant: assistant.into(),
        });
        while session.turns.len() > self.window {
            session.turns.pop_front();
        }
    }

    /// Turns for a session, oldest first
    pub fn turns(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .lock()
            .by_id
            .get(session_id)
            .map(|session| session.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// History as alternating user/assistant messages
    pub fn messages(&self, session_id: &str) -> Vec<ChatMessage> {
        self.turns(session_id)
            .into_iter()
            .flat_map(|turn| [ChatMessage::user(turn.user), ChatMessage::assistant(turn.assistant)])
            .collect()
    }

    pub fn turn_count(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .by_id
            .get(session_id)
            .map_or(0, |session| session.turns.len())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().by_id.len()
    }

    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.lock().by_id.remove(session_id).is_some()
    }
}
