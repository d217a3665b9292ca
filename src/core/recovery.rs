//! Standardized recoverable error payloads.
//!
//! Every blocked tool call returns a machine-parseable JSON payload with a
//! `_recovery` section telling the agent how to proceed. The payload shape
//! is stable wire format; agents key on `error.type`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire-stable error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    IntentRequired,
    ScopeViolation,
    DestructiveCommand,
    StaleFile,
    FileLocked,
    FileExcluded,
    CommandExcluded,
    MissingIntent,
    HookError,
}

impl ErrorKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::IntentRequired => "INTENT_REQUIRED",
            Self::ScopeViolation => "SCOPE_VIOLATION",
            Self::DestructiveCommand => "DESTRUCTIVE_COMMAND",
            Self::StaleFile => "STALE_FILE",
            Self::FileLocked => "FILE_LOCKED",
            Self::FileExcluded => "FILE_EXCLUDED",
            Self::CommandExcluded => "COMMAND_EXCLUDED",
            Self::MissingIntent => "MISSING_INTENT",
            Self::HookError => "HOOK_ERROR",
        }
    }

    /// Whether the agent should retry the same call after acting on the
    /// suggestions. Policy blocks want a *different* call, not a retry.
    pub fn retry(&self) -> bool {
        matches!(self, Self::StaleFile | Self::FileLocked | Self::HookError)
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::IntentRequired | Self::MissingIntent => {
                "Select a valid intent before mutating anything."
            }
            Self::ScopeViolation => "Stay within the globs owned by the active intent.",
            Self::DestructiveCommand => {
                "The command was classified destructive and was not approved."
            }
            Self::StaleFile => "The file changed since you last read it.",
            Self::FileLocked => "Another session holds the lock for this file.",
            Self::FileExcluded | Self::CommandExcluded => {
                "The target is excluded by governance rules."
            }
            Self::HookError => "The governance pipeline failed internally.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A hook-raised blocking condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl GateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Extra context threaded into the suggested-actions list.
#[derive(Debug, Clone, Default)]
pub struct RecoveryDetails {
    /// FIFO position for FILE_LOCKED
    pub queue_position: Option<usize>,
    /// Safer alternative for DESTRUCTIVE_COMMAND
    pub alternative: Option<String>,
    /// Allowed scope globs for SCOPE_VIOLATION
    pub allowed_scopes: Vec<String>,
    /// Arbitrary extra fields copied into `error.details`
    pub extra: Option<Value>,
}

/// Build the standardized recovery payload for a blocked call.
pub fn recovery_payload(err: &GateError, details: &RecoveryDetails) -> Value {
    let kind = err.kind;
    let mut actions: Vec<String> = match kind {
        ErrorKind::IntentRequired | ErrorKind::MissingIntent => vec![
            "call select_intent with a valid id".into(),
            "check the intent declaration store".into(),
        ],
        ErrorKind::ScopeViolation => vec![
            "request scope expansion".into(),
            "switch to an intent with broader scope".into(),
            "restrict changes to allowed globs".into(),
        ],
        ErrorKind::DestructiveCommand => vec![
            "use a safer alternative".into(),
            "split the operation".into(),
            "obtain explicit user approval".into(),
        ],
        ErrorKind::StaleFile => vec![
            "re-read current content".into(),
            "merge against the new version".into(),
            "restart with a fresh snapshot".into(),
        ],
        ErrorKind::FileExcluded | ErrorKind::CommandExcluded => vec![
            "remove from the exclusion rules".into(),
            "choose a different target".into(),
            "ask for approval".into(),
        ],
        ErrorKind::FileLocked => {
            let position = details.queue_position.unwrap_or(0);
            vec![
                format!("wait for queue position {}", position),
                "back off and retry".into(),
            ]
        }
        ErrorKind::HookError => vec!["retry".into(), "report to maintainer".into()],
    };
    if kind == ErrorKind::DestructiveCommand {
        if let Some(alt) = &details.alternative {
            actions.insert(0, format!("use a safer alternative: {}", alt));
        }
    }
    if kind == ErrorKind::ScopeViolation && !details.allowed_scopes.is_empty() {
        actions.push(format!(
            "allowed globs: {}",
            details.allowed_scopes.join(", ")
        ));
    }

    let mut error = json!({
        "type": kind.as_wire(),
        "message": err.message,
        "recoverable": true,
    });
    if let Some(s) = &err.suggestion {
        error["suggestion"] = json!(s);
    }
    if let Some(extra) = &details.extra {
        error["details"] = extra.clone();
    }

    json!({
        "status": "error",
        "error": error,
        "_recovery": {
            "instruction": kind.instruction(),
            "retry": kind.retry(),
            "suggested_actions": actions,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_constants_are_stable() {
        assert_eq!(ErrorKind::IntentRequired.as_wire(), "INTENT_REQUIRED");
        assert_eq!(ErrorKind::HookError.as_wire(), "HOOK_ERROR");
        assert_eq!(ErrorKind::MissingIntent.as_wire(), "MISSING_INTENT");
    }

    #[test]
    fn file_locked_payload_names_queue_position() {
        let err = GateError::new(ErrorKind::FileLocked, "f.ts is locked");
        let details = RecoveryDetails {
            queue_position: Some(2),
            ..RecoveryDetails::default()
        };
        let payload = recovery_payload(&err, &details);
        let actions = payload["_recovery"]["suggested_actions"].as_array().unwrap();
        assert!(actions
            .iter()
            .any(|a| a.as_str().unwrap().contains("queue position 2")));
        assert_eq!(payload["_recovery"]["retry"], json!(true));
    }

    #[test]
    fn destructive_payload_carries_alternative() {
        let err = GateError::new(ErrorKind::DestructiveCommand, "git push --force blocked");
        let details = RecoveryDetails {
            alternative: Some("git push --force-with-lease".into()),
            ..RecoveryDetails::default()
        };
        let payload = recovery_payload(&err, &details);
        let rendered = payload["_recovery"]["suggested_actions"].to_string();
        assert!(rendered.contains("--force-with-lease"));
        assert_eq!(payload["error"]["type"], json!("DESTRUCTIVE_COMMAND"));
        assert_eq!(payload["status"], json!("error"));
    }

    #[test]
    fn hook_error_is_recoverable() {
        let err = GateError::new(ErrorKind::HookError, "registry poisoned");
        let payload = recovery_payload(&err, &RecoveryDetails::default());
        assert_eq!(payload["error"]["recoverable"], json!(true));
        assert_eq!(payload["_recovery"]["retry"], json!(true));
    }
}
