//! Concurrent agent session tracking.
//!
//! A session is created on its first tool call and expires after five
//! minutes of inactivity. Sessions and locks are peers: the registry holds
//! no lock state, only opaque session ids that the `LockManager` keys its
//! flat tables by. The reaper tells the lock manager which ids died.

use crate::core::error::CorridorError;
use crate::core::time;
use std::collections::HashMap;
use std::sync::Mutex;

/// Sessions idle longer than this are expired by the reaper.
pub const SESSION_IDLE_EXPIRY_SECS: u64 = 300;

/// Per-agent runtime state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub intent_id: Option<String>,
    pub model_id: Option<String>,
    pub conversation_id: Option<String>,
    pub last_seen: u64,
    pub tool_calls: u64,
    pub blocked_calls: u64,
}

impl Session {
    fn new(id: &str, now: u64) -> Self {
        Self {
            id: id.to_string(),
            intent_id: None,
            model_id: None,
            conversation_id: None,
            last_seen: now,
            tool_calls: 0,
            blocked_calls: 0,
        }
    }
}

/// Process-wide registry of live sessions.
pub struct SessionRegistry {
    inner: Mutex<HashMap<String, Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create the session if missing and bump its activity clock and
    /// call counter.
    pub fn touch(&self, id: &str) -> Result<(), CorridorError> {
        let now = time::now_epoch_secs();
        let mut map = self.lock()?;
        let session = map.entry(id.to_string()).or_insert_with(|| Session::new(id, now));
        session.last_seen = now;
        session.tool_calls += 1;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Session>, CorridorError> {
        Ok(self.lock()?.get(id).cloned())
    }

    pub fn intent_of(&self, id: &str) -> Result<Option<String>, CorridorError> {
        Ok(self.lock()?.get(id).and_then(|s| s.intent_id.clone()))
    }

    pub fn set_intent(&self, id: &str, intent_id: &str) -> Result<(), CorridorError> {
        let now = time::now_epoch_secs();
        let mut map = self.lock()?;
        let session = map.entry(id.to_string()).or_insert_with(|| Session::new(id, now));
        session.intent_id = Some(intent_id.to_string());
        Ok(())
    }

    pub fn set_model(&self, id: &str, model_id: &str) -> Result<(), CorridorError> {
        let now = time::now_epoch_secs();
        let mut map = self.lock()?;
        let session = map.entry(id.to_string()).or_insert_with(|| Session::new(id, now));
        session.model_id = Some(model_id.to_string());
        Ok(())
    }

    pub fn set_conversation(&self, id: &str, conversation_id: &str) -> Result<(), CorridorError> {
        let now = time::now_epoch_secs();
        let mut map = self.lock()?;
        let session = map.entry(id.to_string()).or_insert_with(|| Session::new(id, now));
        session.conversation_id = Some(conversation_id.to_string());
        Ok(())
    }

    pub fn record_block(&self, id: &str) -> Result<(), CorridorError> {
        let mut map = self.lock()?;
        if let Some(session) = map.get_mut(id) {
            session.blocked_calls += 1;
        }
        Ok(())
    }

    /// Remove sessions idle past [`SESSION_IDLE_EXPIRY_SECS`]. Returns the
    /// expired ids so the caller can tell the lock manager to forget them.
    pub fn expire_idle(&self, now: u64) -> Result<Vec<String>, CorridorError> {
        let mut map = self.lock()?;
        let expired: Vec<String> = map
            .values()
            .filter(|s| now.saturating_sub(s.last_seen) > SESSION_IDLE_EXPIRY_SECS)
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            map.remove(id);
        }
        Ok(expired)
    }

    pub fn live_count(&self) -> Result<usize, CorridorError> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, CorridorError> {
        self.inner
            .lock()
            .map_err(|_| CorridorError::LockPoisoned("session registry".into()))
    }

    #[cfg(test)]
    pub fn backdate(&self, id: &str, secs: u64) {
        let mut map = self.inner.lock().unwrap();
        if let Some(s) = map.get_mut(id) {
            s.last_seen = s.last_seen.saturating_sub(secs);
        }
    }
}
