//! Scope and destructive-command enforcement through the full pipeline.

use corridor::core::approval::{ApprovalDecision, UserApprovalPort};
use corridor::core::hooks::ToolResult;
use corridor::core::recovery::ErrorKind;
use corridor::core::trace::VcsSnapshot;
use corridor::core::vcs::StaticProbe;
use corridor::plugins::command_risk::CommandClassification;
use corridor::plugins::intents::Intent;
use corridor::Governor;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Rejects everything but records what it was asked.
struct RejectingPort;

impl UserApprovalPort for RejectingPort {
    fn confirm_destructive(
        &self,
        _command: &str,
        _classification: &CommandClassification,
        _intent_id: Option<&str>,
    ) -> ApprovalDecision {
        ApprovalDecision {
            approved: false,
            feedback: Some("not while the demo is running".into()),
            remember: false,
        }
    }

    fn confirm_scope_violation(
        &self,
        _intent: &Intent,
        _path: &str,
        _scopes: &[String],
    ) -> ApprovalDecision {
        ApprovalDecision::reject()
    }

    fn confirm_intent_evolution(&self, _intent_id: &str, _summary: &str) -> ApprovalDecision {
        ApprovalDecision::reject()
    }
}

fn governor_with_port(port: Arc<dyn UserApprovalPort>) -> (TempDir, Governor) {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join(".corridor")).unwrap();
    std::fs::write(
        tmp.path().join(".corridor/intents.yaml"),
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
    let governor = Governor::bootstrap(
        tmp.path(),
        port,
        Arc::new(StaticProbe(VcsSnapshot::unknown())),
    )
    .unwrap();
    let mut args = Map::new();
    args.insert("intent_id".into(), Value::String("INT-001".into()));
    assert!(governor.select_intent("s-1", args).success);
    (tmp, governor)
}

fn write_tool(workspace: &Path) -> impl FnOnce(&Map<String, Value>) -> ToolResult + '_ {
    move |args| {
        let path = args.get("path").and_then(Value::as_str).unwrap();
        let content = args.get("content").and_then(Value::as_str).unwrap_or("");
        let full = workspace.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
        ToolResult::ok(Value::Null)
    }
}

#[test]
fn out_of_scope_write_blocks_with_the_allowed_globs() {
    let (tmp, governor) = governor_with_port(Arc::new(RejectingPort));
    governor.register_read("src/other/x.ts", "s-1").unwrap();

    let mut args = Map::new();
    args.insert("path".into(), Value::String("src/other/x.ts".into()));
    args.insert("content".into(), Value::String("nope".into()));
    let result = governor.execute("write_to_file", args, "s-1", write_tool(tmp.path()));

    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::ScopeViolation);
    assert!(error.suggestion.unwrap().contains("src/api/weather/**"));
    // No journal entry and no file on disk.
    assert!(governor.traces.all().is_empty());
    assert!(!tmp.path().join("src/other/x.ts").exists());
}

#[test]
fn rejected_force_push_suggests_force_with_lease() {
    let (_tmp, governor) = governor_with_port(Arc::new(RejectingPort));

    let mut args = Map::new();
    args.insert("command".into(), Value::String("git push --force".into()));
    let result = governor.execute("execute_command", args, "s-1", |_args| {
        ToolResult::ok(json!("ran"))
    });

    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::DestructiveCommand);
    let payload = result.llm_error.unwrap();
    let actions = payload["_recovery"]["suggested_actions"].to_string();
    assert!(actions.contains("--force-with-lease"));
}

#[test]
fn safe_commands_run_without_any_modal() {
    struct PanickingPort;
    impl UserApprovalPort for PanickingPort {
        fn confirm_destructive(
            &self,
            _c: &str,
            _cl: &CommandClassification,
            _i: Option<&str>,
        ) -> ApprovalDecision {
            panic!("safe command must not reach the approval port");
        }
        fn confirm_scope_violation(
            &self,
            _i: &Intent,
            _p: &str,
            _s: &[String],
        ) -> ApprovalDecision {
            panic!("in-scope write must not reach the approval port");
        }
        fn confirm_intent_evolution(&self, _i: &str, _s: &str) -> ApprovalDecision {
            ApprovalDecision::reject()
        }
    }

    let (_tmp, governor) = governor_with_port(Arc::new(PanickingPort));
    let mut args = Map::new();
    args.insert("command".into(), Value::String("git status".into()));
    let result = governor.execute("execute_command", args, "s-1", |_args| {
        ToolResult::ok(json!("clean"))
    });
    assert!(result.success);
}

#[test]
fn approved_destructive_command_passes_and_can_be_remembered() {
    struct ApprovingPort;
    impl UserApprovalPort for ApprovingPort {
        fn confirm_destructive(
            &self,
            _c: &str,
            _cl: &CommandClassification,
            _i: Option<&str>,
        ) -> ApprovalDecision {
            ApprovalDecision {
                approved: true,
                feedback: None,
                remember: true,
            }
        }
        fn confirm_scope_violation(
            &self,
            _i: &Intent,
            _p: &str,
            _s: &[String],
        ) -> ApprovalDecision {
            ApprovalDecision::reject()
        }
        fn confirm_intent_evolution(&self, _i: &str, _s: &str) -> ApprovalDecision {
            ApprovalDecision::reject()
        }
    }

    let (_tmp, governor) = governor_with_port(Arc::new(ApprovingPort));
    let mut args = Map::new();
    args.insert("command".into(), Value::String("rm -rf target".into()));
    let result = governor.execute("execute_command", args.clone(), "s-1", |_args| {
        ToolResult::ok(json!("cleaned"))
    });
    assert!(result.success);
    assert_eq!(governor.ledger.list().unwrap().len(), 1);

    // The remembered fingerprint now short-circuits the modal entirely.
    let result = governor.execute("execute_command", args, "s-1", |_args| {
        ToolResult::ok(json!("cleaned again"))
    });
    assert!(result.success);
}

#[test]
fn excluded_paths_block_before_the_scope_check() {
    let (tmp, governor) = governor_with_port(Arc::new(RejectingPort));
    let mut args = Map::new();
    args.insert(
        "path".into(),
        Value::String("node_modules/pkg/index.js".into()),
    );
    args.insert("content".into(), Value::String("x".into()));
    let result = governor.execute("write_to_file", args, "s-1", write_tool(tmp.path()));
    assert_eq!(result.error.unwrap().kind, ErrorKind::FileExcluded);
}
