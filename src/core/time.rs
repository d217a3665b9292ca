//! Shared timestamp/identifier helpers for deterministic envelopes.

use chrono::{SecondsFormat, Utc};
use ulid::Ulid;

/// Returns the current time as an RFC 3339 string (e.g. `2026-08-02T09:15:30Z`).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Returns unix-epoch seconds. Used for lock/session age arithmetic.
pub fn now_epoch_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}
