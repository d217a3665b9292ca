//! Per-file exclusive locks with FIFO wait queues and optimistic
//! read-version validation.
//!
//! Lock keys are normalized paths: `\` replaced with `/`, lower-cased.
//! File reads use the caller-supplied form so case-sensitive filesystems
//! behave. All state lives in flat tables keyed by path and session id;
//! sessions and locks reference each other only through those ids.
//!
//! Queueing does not confer ownership: a woken waiter must go back through
//! `acquire`, which keeps stale waiters from inverting priority.

use crate::core::audit::AuditLog;
use crate::core::error::CorridorError;
use crate::core::spatial;
use crate::core::time;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

/// An incumbent older than this is evicted when a new acquirer arrives.
pub const LOCK_EVICT_AFTER_SECS: u64 = 30;
/// The reaper force-releases locks older than this.
pub const LOCK_REAP_AFTER_SECS: u64 = 60;
/// Reaper tick interval.
pub const REAPER_INTERVAL_SECS: u64 = 30;

/// Canonical lock key for a path.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Acquired,
    Contended { holder: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteValidation {
    Ok,
    Stale { current_hash: String },
    NoPriorRead,
}

struct LockEntry {
    holder: String,
    acquired_at: u64,
}

struct Waiter {
    session: String,
    wake: Sender<()>,
}

#[derive(Default)]
struct LockState {
    locks: HashMap<String, LockEntry>,
    waiters: HashMap<String, VecDeque<Waiter>>,
    /// (normalized path, session) -> (content hash, registered at)
    versions: HashMap<(String, String), (String, u64)>,
}

/// A slot in a path's FIFO wait queue.
///
/// `wait` blocks until the slot advances to the head after a release. The
/// caller must then retry `acquire`; the ticket never confers ownership.
/// Dropping the ticket abandons the slot; it is discarded on the next
/// release that reaches it.
pub struct QueueTicket {
    pub position: usize,
    rx: Receiver<()>,
}

impl QueueTicket {
    pub fn wait(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }
}

/// Process-wide exclusive lock table for workspace files.
pub struct LockManager {
    workspace_root: PathBuf,
    state: Mutex<LockState>,
    audit: Option<AuditLog>,
}

impl LockManager {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            state: Mutex::new(LockState::default()),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    fn warn(&self, op: &str, detail: &str) {
        if let Some(audit) = &self.audit {
            audit.warn(op, detail);
        }
    }

    /// Try to take the exclusive lock for `path`.
    ///
    /// An incumbent older than [`LOCK_EVICT_AFTER_SECS`] is evicted (with a
    /// warning) and the caller takes over. Eviction never drops the path's
    /// wait queue.
    pub fn acquire(&self, path: &str, session: &str) -> Result<Acquisition, CorridorError> {
        let key = normalize_path(path);
        let now = time::now_epoch_secs();
        let mut evicted = None;
        let mut state = self.lock_state()?;
        if let Some(entry) = state.locks.get(&key) {
            if entry.holder == session {
                return Ok(Acquisition::Acquired);
            }
            if now.saturating_sub(entry.acquired_at) > LOCK_EVICT_AFTER_SECS {
                evicted = Some(entry.holder.clone());
                state.locks.remove(&key);
            } else {
                return Ok(Acquisition::Contended {
                    holder: entry.holder.clone(),
                });
            }
        }
        state.locks.insert(
            key.clone(),
            LockEntry {
                holder: session.to_string(),
                acquired_at: now,
            },
        );
        drop(state);
        if let Some(stale) = evicted {
            self.warn(
                "locks.evict",
                &format!("evicted stale holder {} of {}", stale, key),
            );
        }
        Ok(Acquisition::Acquired)
    }

    /// Release the lock if `session` is the current holder, then wake the
    /// head of the FIFO queue. No-op for non-holders.
    pub fn release(&self, path: &str, session: &str) -> Result<(), CorridorError> {
        let key = normalize_path(path);
        let mut state = self.lock_state()?;
        match state.locks.get(&key) {
            Some(entry) if entry.holder == session => {
                state.locks.remove(&key);
                Self::wake_next(&mut state, &key);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Record the content version `session` observed for `path`.
    ///
    /// Reads the current on-disk content (empty if the file is missing) and
    /// stores its normalized hash under `(path, session)`.
    pub fn register_read(&self, path: &str, session: &str) -> Result<String, CorridorError> {
        let content = self.current_content(path);
        let hash = spatial::hash(&content);
        let key = (normalize_path(path), session.to_string());
        let mut state = self.lock_state()?;
        state
            .versions
            .insert(key, (hash.clone(), time::now_epoch_secs()));
        Ok(hash)
    }

    /// Compare the current on-disk hash against the version `session`
    /// registered. Equal hashes validate the write.
    pub fn validate_write(&self, path: &str, session: &str) -> Result<WriteValidation, CorridorError> {
        let key = (normalize_path(path), session.to_string());
        let registered = {
            let state = self.lock_state()?;
            state.versions.get(&key).map(|(h, _)| h.clone())
        };
        let Some(registered) = registered else {
            return Ok(WriteValidation::NoPriorRead);
        };
        let current = spatial::hash(&self.current_content(path));
        if current == registered {
            Ok(WriteValidation::Ok)
        } else {
            Ok(WriteValidation::Stale {
                current_hash: current,
            })
        }
    }

    /// Join the FIFO wait queue for `path`. The returned ticket resolves
    /// when the slot advances to head; the caller must then `acquire`.
    pub fn queue_write(&self, path: &str, session: &str) -> Result<QueueTicket, CorridorError> {
        let key = normalize_path(path);
        let (tx, rx) = channel();
        let mut state = self.lock_state()?;
        let queue = state.waiters.entry(key).or_default();
        let position = queue.len();
        queue.push_back(Waiter {
            session: session.to_string(),
            wake: tx,
        });
        Ok(QueueTicket { position, rx })
    }

    /// Current queue length for a path (diagnostics).
    pub fn queue_depth(&self, path: &str) -> Result<usize, CorridorError> {
        let key = normalize_path(path);
        let state = self.lock_state()?;
        Ok(state.waiters.get(&key).map_or(0, VecDeque::len))
    }

    /// Force-release locks older than [`LOCK_REAP_AFTER_SECS`] and advance
    /// their queues. Returns the reaped paths.
    pub fn reap_stale(&self, now: u64) -> Result<Vec<String>, CorridorError> {
        let mut reaped = Vec::new();
        let mut state = self.lock_state()?;
        let expired: Vec<String> = state
            .locks
            .iter()
            .filter(|(_, e)| now.saturating_sub(e.acquired_at) > LOCK_REAP_AFTER_SECS)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            state.locks.remove(&key);
            Self::wake_next(&mut state, &key);
            reaped.push(key);
        }
        drop(state);
        for key in &reaped {
            self.warn("locks.reap", &format!("force-released stale lock on {}", key));
        }
        Ok(reaped)
    }

    /// Drop all lock state belonging to an expired session: held locks,
    /// queued waiters, and registered read-versions.
    pub fn forget_session(&self, session: &str) -> Result<(), CorridorError> {
        let mut state = self.lock_state()?;
        let held: Vec<String> = state
            .locks
            .iter()
            .filter(|(_, e)| e.holder == session)
            .map(|(k, _)| k.clone())
            .collect();
        for key in held {
            state.locks.remove(&key);
            Self::wake_next(&mut state, &key);
        }
        for queue in state.waiters.values_mut() {
            queue.retain(|w| w.session != session);
        }
        state.versions.retain(|(_, s), _| s != session);
        Ok(())
    }

    /// Wake the queue head; waiters whose receiver was dropped are
    /// discarded and the next live one is woken instead.
    fn wake_next(state: &mut LockState, key: &str) {
        if let Some(queue) = state.waiters.get_mut(key) {
            while let Some(waiter) = queue.pop_front() {
                if waiter.wake.send(()).is_ok() {
                    break;
                }
            }
            if queue.is_empty() {
                state.waiters.remove(key);
            }
        }
    }

    /// Current on-disk content for a workspace-relative path, empty if the
    /// file is missing.
    pub fn current_content(&self, path: &str) -> String {
        std::fs::read_to_string(self.workspace_root.join(path)).unwrap_or_default()
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, LockState>, CorridorError> {
        self.state
            .lock()
            .map_err(|_| CorridorError::LockPoisoned("lock manager state".into()))
    }

    #[cfg(test)]
    fn backdate(&self, path: &str, secs: u64) {
        let key = normalize_path(path);
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.locks.get_mut(&key) {
            entry.acquired_at = entry.acquired_at.saturating_sub(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, LockManager) {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = LockManager::new(tmp.path().to_path_buf());
        (tmp, mgr)
    }

    #[test]
    fn exclusive_acquire_and_release() {
        let (_tmp, mgr) = manager();
        assert_eq!(mgr.acquire("f.ts", "a").unwrap(), Acquisition::Acquired);
        assert_eq!(
            mgr.acquire("f.ts", "b").unwrap(),
            Acquisition::Contended {
                holder: "a".into()
            }
        );
        // Re-acquire by the holder is idempotent.
        assert_eq!(mgr.acquire("f.ts", "a").unwrap(), Acquisition::Acquired);
        mgr.release("f.ts", "a").unwrap();
        assert_eq!(mgr.acquire("f.ts", "b").unwrap(), Acquisition::Acquired);
    }

    #[test]
    fn release_by_non_holder_is_noop() {
        let (_tmp, mgr) = manager();
        mgr.acquire("f.ts", "a").unwrap();
        mgr.release("f.ts", "b").unwrap();
        assert!(matches!(
            mgr.acquire("f.ts", "b").unwrap(),
            Acquisition::Contended { .. }
        ));
    }

    #[test]
    fn paths_normalize_to_one_key() {
        let (_tmp, mgr) = manager();
        mgr.acquire("Src\\Api\\F.ts", "a").unwrap();
        assert!(matches!(
            mgr.acquire("src/api/f.ts", "b").unwrap(),
            Acquisition::Contended { .. }
        ));
    }

    #[test]
    fn stale_incumbent_is_evicted_on_acquire() {
        let (_tmp, mgr) = manager();
        mgr.acquire("f.ts", "a").unwrap();
        mgr.backdate("f.ts", LOCK_EVICT_AFTER_SECS + 5);
        assert_eq!(mgr.acquire("f.ts", "b").unwrap(), Acquisition::Acquired);
    }

    #[test]
    fn waiters_are_served_fifo_and_must_reacquire() {
        let (_tmp, mgr) = manager();
        mgr.acquire("f.ts", "a").unwrap();
        let t1 = mgr.queue_write("f.ts", "b").unwrap();
        let t2 = mgr.queue_write("f.ts", "c").unwrap();
        assert_eq!(t1.position, 0);
        assert_eq!(t2.position, 1);
        mgr.release("f.ts", "a").unwrap();
        assert!(t1.wait(Duration::from_millis(100)));
        assert!(!t2.wait(Duration::from_millis(50)));
        // Waking does not confer ownership.
        assert_eq!(mgr.acquire("f.ts", "b").unwrap(), Acquisition::Acquired);
    }

    #[test]
    fn dropped_waiter_is_skipped_on_release() {
        let (_tmp, mgr) = manager();
        mgr.acquire("f.ts", "a").unwrap();
        let t1 = mgr.queue_write("f.ts", "b").unwrap();
        let t2 = mgr.queue_write("f.ts", "c").unwrap();
        drop(t1);
        mgr.release("f.ts", "a").unwrap();
        assert!(t2.wait(Duration::from_millis(100)));
    }

    #[test]
    fn validate_write_requires_prior_read() {
        let (tmp, mgr) = manager();
        std::fs::write(tmp.path().join("f.ts"), "v1").unwrap();
        assert_eq!(
            mgr.validate_write("f.ts", "a").unwrap(),
            WriteValidation::NoPriorRead
        );
        mgr.register_read("f.ts", "a").unwrap();
        assert_eq!(mgr.validate_write("f.ts", "a").unwrap(), WriteValidation::Ok);
        std::fs::write(tmp.path().join("f.ts"), "v2").unwrap();
        assert!(matches!(
            mgr.validate_write("f.ts", "a").unwrap(),
            WriteValidation::Stale { .. }
        ));
    }

    #[test]
    fn register_read_of_missing_file_hashes_empty() {
        let (_tmp, mgr) = manager();
        let hash = mgr.register_read("ghost.ts", "a").unwrap();
        assert_eq!(hash, spatial::hash(""));
        assert_eq!(
            mgr.validate_write("ghost.ts", "a").unwrap(),
            WriteValidation::Ok
        );
    }

    #[test]
    fn reaper_force_releases_and_wakes() {
        let (_tmp, mgr) = manager();
        mgr.acquire("f.ts", "a").unwrap();
        let ticket = mgr.queue_write("f.ts", "b").unwrap();
        mgr.backdate("f.ts", LOCK_REAP_AFTER_SECS + 10);
        let reaped = mgr.reap_stale(time::now_epoch_secs()).unwrap();
        assert_eq!(reaped, vec!["f.ts".to_string()]);
        assert!(ticket.wait(Duration::from_millis(100)));
        assert_eq!(mgr.acquire("f.ts", "b").unwrap(), Acquisition::Acquired);
    }

    #[test]
    fn fresh_locks_survive_the_reaper() {
        let (_tmp, mgr) = manager();
        mgr.acquire("f.ts", "a").unwrap();
        assert!(mgr.reap_stale(time::now_epoch_secs()).unwrap().is_empty());
        assert!(matches!(
            mgr.acquire("f.ts", "b").unwrap(),
            Acquisition::Contended { .. }
        ));
    }

    #[test]
    fn forget_session_drops_locks_waiters_and_versions() {
        let (tmp, mgr) = manager();
        std::fs::write(tmp.path().join("f.ts"), "v1").unwrap();
        mgr.acquire("f.ts", "a").unwrap();
        mgr.register_read("f.ts", "a").unwrap();
        let _ticket = mgr.queue_write("f.ts", "a").unwrap();
        mgr.forget_session("a").unwrap();
        assert_eq!(mgr.acquire("f.ts", "b").unwrap(), Acquisition::Acquired);
        assert_eq!(mgr.queue_depth("f.ts").unwrap(), 0);
        assert_eq!(
            mgr.validate_write("f.ts", "a").unwrap(),
            WriteValidation::NoPriorRead
        );
    }
}
