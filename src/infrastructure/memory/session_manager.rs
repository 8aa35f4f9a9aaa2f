//! In-Memory Synthesis Session Manager Implementation

use chrono::Utc;
use dashmap::DashMap;

use crate::application::ports::{SessionError, SynthesisSessionPort};
use crate::domain::synthesis::{session_key, ConnectionState, SynthesisSession};
use crate::domain::voice::Persona;

/// 内存会话管理器
pub struct InMemorySynthesisSessionManager {
    sessions: DashMap<String, SynthesisSession>,
}

impl InMemorySynthesisSessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for InMemorySynthesisSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisSessionPort for InMemorySynthesisSessionManager {
    fn open(&self, session: SynthesisSession) -> Result<String, SessionError> {
        let key = session.key();
        if self.sessions.contains_key(&key) {
            return Err(SessionError::AlreadyExists(key));
        }
        let context_id = session.context_id.clone();
        self.sessions.insert(key.clone(), session);
        tracing::info!(session = %key, context_id = %context_id, "Synthesis session opened");
        Ok(context_id)
    }

    fn find(&self, user_id: &str, persona: Persona) -> Option<SynthesisSession> {
        self.sessions
            .get(&session_key(user_id, persona))
            .map(|s| s.clone())
    }

    fn touch(&self, user_id: &str, persona: Persona) {
        if let Some(mut session) = self.sessions.get_mut(&session_key(user_id, persona)) {
            session.last_activity = Utc::now();
        }
    }

    fn close(&self, user_id: &str, persona: Persona) -> Result<(), SessionError> {
        let key = session_key(user_id, persona);
        self.sessions
            .remove(&key)
            .map(|_| {
                tracing::info!(session = %key, "Synthesis session closed");
            })
            .ok_or(SessionError::NotFound(key))
    }

    fn close_all(&self, final_state: ConnectionState) -> usize {
        let mut closed = 0;
        self.sessions.retain(|key, session| {
            session.connection_state = final_state;
            tracing::debug!(session = %key, state = %final_state, "Synthesis session destroyed");
            closed += 1;
            false
        });
        closed
    }

    fn get_expired(&self, idle_timeout_secs: u64) -> Vec<SynthesisSession> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(idle_timeout_secs as i64);

        self.sessions
            .iter()
            .filter(|entry| now - entry.last_activity > timeout)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn list_all(&self) -> Vec<SynthesisSession> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    fn count(&self) -> usize {
        self.sessions.len()
    }
}
