//! Intent gatekeeper pre-hook.
//!
//! Every tool except `select_intent` requires the session to have declared
//! an intent. This is the first gate in the corridor; nothing mutates
//! anonymously.

use crate::core::hooks::PreHook;
use crate::core::recovery::{recovery_payload, ErrorKind, GateError, RecoveryDetails};
use crate::core::session::SessionRegistry;
use crate::plugins::select_intent::SELECT_INTENT_TOOL;
use std::sync::Arc;

pub fn make_hook(sessions: Arc<SessionRegistry>) -> PreHook {
    Arc::new(move |ctx| {
        if ctx.tool_name == SELECT_INTENT_TOOL {
            return Ok(());
        }
        if sessions.intent_of(&ctx.session_id)?.is_none() {
            let error = GateError::new(
                ErrorKind::IntentRequired,
                format!(
                    "session {} has no active intent; {} requires one",
                    ctx.session_id, ctx.tool_name
                ),
            )
            .with_suggestion("call select_intent with a valid intent id first");
            let payload = recovery_payload(&error, &RecoveryDetails::default());
            ctx.block(error, payload);
        }
        Ok(())
    })
}
