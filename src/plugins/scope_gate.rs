//! Scope enforcement for `write_to_file`.
//!
//! A write must land inside the active intent's owned scope globs. Out of
//! scope, the human can still approve the write through the port; a
//! rejection blocks with the allowed globs spelled out so the agent can
//! redirect itself.

use crate::core::approval::UserApprovalPort;
use crate::core::hooks::PreHook;
use crate::core::recovery::{recovery_payload, ErrorKind, GateError, RecoveryDetails};
use crate::core::session::SessionRegistry;
use crate::plugins::ignore_rules::IgnoreIndex;
use crate::plugins::intents::{self, IntentStore};
use serde_json::json;
use std::sync::Arc;

pub struct ScopeGate {
    pub intents: Arc<IntentStore>,
    pub ignore: Arc<IgnoreIndex>,
    pub sessions: Arc<SessionRegistry>,
    pub approval: Arc<dyn UserApprovalPort>,
}

pub fn make_hook(gate: ScopeGate) -> PreHook {
    Arc::new(move |ctx| {
        let Some(path) = ctx.arg_str("path").map(str::to_string) else {
            return Ok(());
        };
        let intent_id = gate.sessions.intent_of(&ctx.session_id)?;

        if gate.ignore.is_excluded(&path, intent_id.as_deref()) {
            let error = GateError::new(
                ErrorKind::FileExcluded,
                format!("{} matches an exclusion rule", path),
            );
            let payload = recovery_payload(&error, &RecoveryDetails::default());
            ctx.block(error, payload);
            return Ok(());
        }

        // The gatekeeper runs first, so an absent intent id here means the
        // hook set was wired without it; fail closed either way.
        let Some(intent_id) = intent_id else {
            let error = GateError::new(ErrorKind::IntentRequired, "no intent selected");
            let payload = recovery_payload(&error, &RecoveryDetails::default());
            ctx.block(error, payload);
            return Ok(());
        };
        let Some(intent) = gate.intents.get(&intent_id) else {
            let error = GateError::new(
                ErrorKind::MissingIntent,
                format!("intent {} is not in the declaration store", intent_id),
            )
            .with_suggestion("reload or fix the intent declaration store");
            let payload = recovery_payload(&error, &RecoveryDetails::default());
            ctx.block(error, payload);
            return Ok(());
        };

        let in_scope = intents::scope_matches(&intent, &path);
        let needs_nod = gate.ignore.requires_approval(&path, Some(&intent_id));
        if in_scope && !needs_nod {
            return Ok(());
        }

        let decision = gate
            .approval
            .confirm_scope_violation(&intent, &path, &intent.owned_scope);
        if let Some(feedback) = &decision.feedback {
            ctx.user_feedback = Some(feedback.clone());
        }
        if decision.approved {
            return Ok(());
        }

        let scopes = intent.owned_scope.join(", ");
        let error = GateError::new(
            ErrorKind::ScopeViolation,
            format!("{} is outside the scope of {}", path, intent.id),
        )
        .with_suggestion(if scopes.is_empty() {
            format!("{} owns no writable scope", intent.id)
        } else {
            format!("restrict writes to: {}", scopes)
        });
        let details = RecoveryDetails {
            allowed_scopes: intent.owned_scope.clone(),
            extra: Some(json!({ "path": path, "intent": intent.id })),
            ..RecoveryDetails::default()
        };
        let payload = recovery_payload(&error, &details);
        ctx.block(error, payload);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::approval::DenyAll;
    use crate::core::hooks::HookContext;
    use serde_json::{Map, Value};

    fn store_with_weather_intent(dir: &std::path::Path) -> Arc<IntentStore> {
        let path = dir.join("intents.yaml");
        std::fs::write(
            &path,
            r#"
active_intents:
  - id: INT-001
    name: Weather API
    status: ACTIVE
    owned_scope:
      - "src/api/weather/**"
"#,
        )
        .unwrap();
        Arc::new(IntentStore::new(path))
    }

    fn gate(dir: &std::path::Path) -> (PreHook, Arc<SessionRegistry>) {
        let sessions = Arc::new(SessionRegistry::new());
        sessions.set_intent("s-1", "INT-001").unwrap();
        let hook = make_hook(ScopeGate {
            intents: store_with_weather_intent(dir),
            ignore: Arc::new(IgnoreIndex::defaults()),
            sessions: sessions.clone(),
            approval: Arc::new(DenyAll),
        });
        (hook, sessions)
    }

    fn ctx_for(path: &str) -> HookContext {
        let mut args = Map::new();
        args.insert("path".into(), Value::String(path.into()));
        HookContext::new("write_to_file", args, "s-1")
    }

    #[test]
    fn in_scope_write_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let (hook, _) = gate(tmp.path());
        let mut ctx = ctx_for("src/api/weather/fetch.ts");
        hook(&mut ctx).unwrap();
        assert!(!ctx.is_blocked());
    }

    #[test]
    fn out_of_scope_write_blocks_and_names_the_globs() {
        let tmp = tempfile::tempdir().unwrap();
        let (hook, _) = gate(tmp.path());
        let mut ctx = ctx_for("src/other/x.ts");
        hook(&mut ctx).unwrap();
        assert!(ctx.is_blocked());
        let error = ctx.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::ScopeViolation);
        assert!(error.suggestion.as_ref().unwrap().contains("src/api/weather/**"));
    }

    #[test]
    fn excluded_path_blocks_before_scope_check() {
        let tmp = tempfile::tempdir().unwrap();
        let (hook, _) = gate(tmp.path());
        let mut ctx = ctx_for("node_modules/pkg/index.js");
        hook(&mut ctx).unwrap();
        assert_eq!(ctx.error.as_ref().unwrap().kind, ErrorKind::FileExcluded);
    }

    #[test]
    fn unknown_intent_id_blocks_as_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let (hook, sessions) = gate(tmp.path());
        sessions.set_intent("s-1", "INT-404").unwrap();
        let mut ctx = ctx_for("src/api/weather/fetch.ts");
        hook(&mut ctx).unwrap();
        assert_eq!(ctx.error.as_ref().unwrap().kind, ErrorKind::MissingIntent);
    }
}
