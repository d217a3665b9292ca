//! Governance event journal.
//!
//! Every pipeline decision (pass, block, bypass) and every internal warning
//! (stale lock eviction, swallowed hook error, trace-append failure) is
//! appended as one JSON line to `governance.events.jsonl`. This is the audit
//! trail for calls that never reach the trace journal: blocked calls, hook
//! failures, and fallback-mode transitions.
//!
//! Appends are serialized through a per-journal mutex and failures are
//! swallowed. Audit must never block or crash the host agent.

use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One governance event line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceEvent {
    /// RFC 3339 timestamp
    pub ts: String,
    /// Unique event identifier (ULID)
    pub event_id: String,
    /// Operation (e.g. "pipeline.block", "locks.evict", "trace.append_failed")
    pub op: String,
    /// Tool the event relates to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_ref: Option<String>,
    /// "pass", "block", "bypass", "warn", or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append-only handle on a governance journal. Cheap to clone.
#[derive(Clone)]
pub struct AuditLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append one event. Failures are swallowed.
    pub fn append(&self, op: &str, status: &str, detail: EventDetail<'_>) {
        let ev = GovernanceEvent {
            ts: time::now_rfc3339(),
            event_id: time::new_event_id(),
            op: op.to_string(),
            tool: detail.tool.map(str::to_string),
            session_id: detail.session_id.map(str::to_string),
            intent_ref: detail.intent_ref.map(str::to_string),
            status: status.to_string(),
            detail: detail.detail.map(str::to_string),
        };
        let Ok(_guard) = self.lock.lock() else {
            return;
        };
        let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) else {
            return;
        };
        if let Ok(json) = serde_json::to_string(&ev) {
            let _ = writeln!(f, "{}", json);
        }
    }

    /// Shorthand for internal warnings unrelated to a specific tool call.
    pub fn warn(&self, op: &str, detail: &str) {
        self.append(
            op,
            "warn",
            EventDetail {
                detail: Some(detail),
                ..EventDetail::default()
            },
        );
    }
}

/// Optional context attached to a governance event.
#[derive(Default, Clone, Copy)]
pub struct EventDetail<'a> {
    pub tool: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub intent_ref: Option<&'a str>,
    pub detail: Option<&'a str>,
}
