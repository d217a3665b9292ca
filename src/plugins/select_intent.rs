//! The `select_intent` tool.
//!
//! The one externally-callable operation: records an intent choice on the
//! session and returns a curated context, not the full declaration. The
//! curated form bounds what flows back into the agent's prompt: at most
//! three constraints, the first owned glob as primary focus, and a short
//! guidance line. `enhanced: true` opts into the full constraint list plus
//! the last three trace entries for the intent.

use crate::core::hooks::ToolResult;
use crate::core::recovery::{recovery_payload, ErrorKind, GateError, RecoveryDetails};
use crate::core::session::SessionRegistry;
use crate::core::trace::TraceStore;
use crate::plugins::intents::{Intent, IntentStatus, IntentStore};
use serde::Serialize;
use serde_json::{Map, Value};

pub const SELECT_INTENT_TOOL: &str = "select_intent";

/// Max constraints returned in the curated (default) variant.
const CURATED_CONSTRAINTS: usize = 3;
/// Trace entries attached in the enhanced variant.
const RECENT_ACTIVITY: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    pub ts: String,
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CuratedContext {
    pub intent_id: String,
    pub name: String,
    pub status: IntentStatus,
    pub constraints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_focus: Option<String>,
    pub guidance: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_activity: Vec<RecentActivity>,
}

/// Execute the intent selection. Runs as the wrapped tool (`next`) inside
/// the pipeline; the gatekeeper exempts it.
pub fn run(
    intents: &IntentStore,
    sessions: &SessionRegistry,
    traces: &TraceStore,
    session_id: &str,
    args: &Map<String, Value>,
) -> ToolResult {
    let Some(intent_id) = args.get("intent_id").and_then(Value::as_str) else {
        let error = GateError::new(ErrorKind::MissingIntent, "select_intent requires intent_id")
            .with_suggestion("pass the id of a declared intent, e.g. INT-001");
        let payload = recovery_payload(&error, &RecoveryDetails::default());
        return ToolResult::blocked(error, Some(payload));
    };
    let Some(intent) = intents.get(intent_id) else {
        let error = GateError::new(
            ErrorKind::MissingIntent,
            format!("intent {} not found", intent_id),
        )
        .with_suggestion("check the intent declaration store for valid ids");
        let payload = recovery_payload(&error, &RecoveryDetails::default());
        return ToolResult::blocked(error, Some(payload));
    };

    if let Err(e) = sessions.set_intent(session_id, &intent.id) {
        let error = GateError::new(ErrorKind::HookError, e.to_string());
        let payload = recovery_payload(&error, &RecoveryDetails::default());
        return ToolResult::blocked(error, Some(payload));
    }
    if let Some(model) = args.get("model_id").and_then(Value::as_str) {
        let _ = sessions.set_model(session_id, model);
    }

    let enhanced = args
        .get("enhanced")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let focus_hint = args.get("context").and_then(Value::as_str);
    let context = build_context(&intent, traces, enhanced, focus_hint);

    match serde_json::to_value(&context) {
        Ok(value) => ToolResult::ok(value),
        Err(e) => {
            let error = GateError::new(ErrorKind::HookError, e.to_string());
            let payload = recovery_payload(&error, &RecoveryDetails::default());
            ToolResult::blocked(error, Some(payload))
        }
    }
}

fn build_context(
    intent: &Intent,
    traces: &TraceStore,
    enhanced: bool,
    focus_hint: Option<&str>,
) -> CuratedContext {
    let constraints = if enhanced {
        intent.constraints.clone()
    } else {
        curate_constraints(&intent.constraints, focus_hint)
    };
    let primary_focus = intent.owned_scope.first().cloned();
    let guidance = match &primary_focus {
        Some(focus) => format!(
            "Work under {} within {}; {} constraint(s) apply.",
            intent.id, focus, constraints.len()
        ),
        None => format!("{} owns no writable scope; treat it as read-only.", intent.id),
    };

    let recent_activity = if enhanced {
        traces
            .recent_for_intent(&intent.id, RECENT_ACTIVITY)
            .into_iter()
            .map(|record| RecentActivity {
                ts: record.ts.clone(),
                files: record
                    .files
                    .iter()
                    .map(|f| f.relative_path.clone())
                    .collect(),
                mutation_class: record
                    .files
                    .iter()
                    .flat_map(|f| f.conversations.iter())
                    .find_map(|c| c.mutation_class)
                    .map(|c| c.to_string()),
            })
            .collect()
    } else {
        Vec::new()
    };

    CuratedContext {
        intent_id: intent.id.clone(),
        name: intent.name.clone(),
        status: intent.status,
        constraints,
        primary_focus,
        guidance,
        recent_activity,
    }
}

/// Keep at most three constraints, preferring those sharing words with the
/// caller's context hint.
fn curate_constraints(constraints: &[String], focus_hint: Option<&str>) -> Vec<String> {
    if constraints.len() <= CURATED_CONSTRAINTS {
        return constraints.to_vec();
    }
    let Some(hint) = focus_hint else {
        return constraints[..CURATED_CONSTRAINTS].to_vec();
    };
    let hint_words: Vec<String> = hint
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    let mut scored: Vec<(usize, &String)> = constraints
        .iter()
        .map(|c| {
            let lower = c.to_lowercase();
            let score = hint_words.iter().filter(|w| lower.contains(*w)).count();
            (score, c)
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(CURATED_CONSTRAINTS)
        .map(|(_, c)| c.clone())
        .collect()
}
