//! Optimistic-lock gate for `write_to_file`.
//!
//! Takes the file's exclusive lock, then validates the session's
//! registered read-version against the on-disk content. Contended paths
//! queue FIFO and block with the queue position; the caller retries after
//! its slot is woken. A stale or unregistered read releases the lock and
//! blocks, forcing a fresh `register_read`.

use crate::core::hooks::PreHook;
use crate::core::locks::{Acquisition, LockManager, WriteValidation};
use crate::core::recovery::{recovery_payload, ErrorKind, GateError, RecoveryDetails};
use serde_json::json;
use std::sync::Arc;

pub fn make_hook(locks: Arc<LockManager>) -> PreHook {
    Arc::new(move |ctx| {
        let Some(path) = ctx.arg_str("path").map(str::to_string) else {
            return Ok(());
        };
        let session_id = ctx.session_id.clone();

        match locks.acquire(&path, &session_id)? {
            Acquisition::Contended { holder } => {
                let ticket = locks.queue_write(&path, &session_id)?;
                let error = GateError::new(
                    ErrorKind::FileLocked,
                    format!(
                        "{} is locked by session {}; queued at position {}",
                        path, holder, ticket.position
                    ),
                )
                .with_suggestion("wait for the wake signal, re-read, then retry the write");
                let details = RecoveryDetails {
                    queue_position: Some(ticket.position),
                    extra: Some(json!({ "path": path, "position": ticket.position })),
                    ..RecoveryDetails::default()
                };
                let payload = recovery_payload(&error, &details);
                ctx.block(error, payload);
                return Ok(());
            }
            Acquisition::Acquired => {}
        }

        // Capture the pre-write content while we hold the lock; the trace
        // recorder classifies the mutation against it.
        ctx.prior_content = Some(locks.current_content(&path));
        ctx.acquired_lock = Some(path.clone());

        match locks.validate_write(&path, &session_id)? {
            WriteValidation::Ok => Ok(()),
            WriteValidation::NoPriorRead => {
                locks.release(&path, &session_id)?;
                ctx.acquired_lock = None;
                let error = GateError::new(
                    ErrorKind::StaleFile,
                    format!("no read-version registered for {} in this session", path),
                )
                .with_suggestion("read the file before writing it");
                let payload = recovery_payload(&error, &RecoveryDetails::default());
                ctx.block(error, payload);
                Ok(())
            }
            WriteValidation::Stale { current_hash } => {
                locks.release(&path, &session_id)?;
                ctx.acquired_lock = None;
                let error = GateError::new(
                    ErrorKind::StaleFile,
                    format!("{} changed since this session last read it", path),
                )
                .with_suggestion("re-read the current content and merge before retrying");
                let details = RecoveryDetails {
                    extra: Some(json!({ "current_hash": current_hash })),
                    ..RecoveryDetails::default()
                };
                let payload = recovery_payload(&error, &details);
                ctx.block(error, payload);
                Ok(())
            }
        }
    })
}
