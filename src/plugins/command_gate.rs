//! Destructive-command gate for `execute_command`.
//!
//! Order of checks: exclusion rules, then risk classification, then the
//! intent's allow-destructive rules, then the remembered-approval ledger,
//! and only then the human. Unknown commands are treated like destructive
//! ones: the gate fails safe.

use crate::core::approval::{ApprovalLedger, UserApprovalPort};
use crate::core::audit::{AuditLog, EventDetail};
use crate::core::hooks::PreHook;
use crate::core::recovery::{recovery_payload, ErrorKind, GateError, RecoveryDetails};
use crate::core::session::SessionRegistry;
use crate::plugins::command_risk;
use crate::plugins::ignore_rules::IgnoreIndex;
use serde_json::json;
use std::sync::Arc;

pub struct CommandGate {
    pub ignore: Arc<IgnoreIndex>,
    pub sessions: Arc<SessionRegistry>,
    pub approval: Arc<dyn UserApprovalPort>,
    pub ledger: Arc<ApprovalLedger>,
    pub audit: AuditLog,
}

pub fn make_hook(gate: CommandGate) -> PreHook {
    Arc::new(move |ctx| {
        let Some(command) = ctx.arg_str("command").map(str::to_string) else {
            // Nothing to classify; the wrapped tool will reject the call.
            return Ok(());
        };
        let intent_id = gate.sessions.intent_of(&ctx.session_id)?;

        if gate.ignore.is_excluded(&command, intent_id.as_deref()) {
            let error = GateError::new(
                ErrorKind::CommandExcluded,
                format!("command matches an exclusion rule: {}", command),
            );
            let payload = recovery_payload(&error, &RecoveryDetails::default());
            ctx.block(error, payload);
            return Ok(());
        }

        let classification = command_risk::classify(&command);
        if !classification.needs_approval() {
            return Ok(());
        }
        if gate.ignore.allows_destructive(intent_id.as_deref()) {
            return Ok(());
        }

        let scope = intent_id.as_deref().unwrap_or("global");
        if gate.ledger.is_remembered(&command, None, scope)? {
            ctx.user_feedback = Some("approved from remembered-approval ledger".into());
            return Ok(());
        }

        let decision =
            gate.approval
                .confirm_destructive(&command, &classification, intent_id.as_deref());
        if let Some(feedback) = &decision.feedback {
            ctx.user_feedback = Some(feedback.clone());
        }
        if decision.approved {
            if decision.remember {
                gate.ledger.record(&command, None, "user", scope)?;
            }
            gate.audit.append(
                "command_gate.approved",
                "pass",
                EventDetail {
                    tool: Some("execute_command"),
                    session_id: Some(&ctx.session_id),
                    intent_ref: intent_id.as_deref(),
                    detail: Some(&command),
                },
            );
            return Ok(());
        }

        let reason = classification
            .reason
            .clone()
            .unwrap_or_else(|| "unrecognized command".to_string());
        let mut error = GateError::new(
            ErrorKind::DestructiveCommand,
            format!("command rejected ({}): {}", reason, command),
        );
        if let Some(alt) = &classification.alternative {
            error = error.with_suggestion(alt.clone());
        }
        let details = RecoveryDetails {
            alternative: classification.alternative.clone(),
            extra: Some(json!({ "classification": classification })),
            ..RecoveryDetails::default()
        };
        let payload = recovery_payload(&error, &details);
        ctx.block(error, payload);
        Ok(())
    })
}
