//! Post-hooks: lock release, trace recording, lessons, recovery logging.
//!
//! Post-hooks never change the tool result. Each runs inside the
//! pipeline's per-hook failure boundary; a recorder that fails is logged
//! and forgotten.

use crate::core::audit::{AuditLog, EventDetail};
use crate::core::hooks::PostHook;
use crate::core::locks::LockManager;
use crate::core::session::SessionRegistry;
use crate::core::spatial;
use crate::core::store::Store;
use crate::core::trace::{
    CodeRange, Contributor, ContributorKind, Conversation, FileTrace, RelatedKind, RelatedRef,
    TraceMetadata, TraceRecord, TraceStore,
};
use crate::core::vcs::VcsProbe;
use crate::plugins::intent_map;
use crate::plugins::lesson::{LessonEntry, LessonLog};
use crate::plugins::mutation;
use std::sync::Arc;

/// Release the lock taken by the stale-file gate, win or lose.
pub fn lock_releaser(locks: Arc<LockManager>) -> PostHook {
    Arc::new(move |ctx, _result| {
        if let Some(path) = &ctx.acquired_lock {
            locks.release(path, &ctx.session_id)?;
        }
        Ok(())
    })
}

pub struct TraceRecorder {
    pub traces: Arc<TraceStore>,
    pub sessions: Arc<SessionRegistry>,
    pub vcs: Arc<dyn VcsProbe>,
    pub store: Store,
    pub audit: AuditLog,
}

/// Append one trace record per accepted write and refresh the derived
/// intent map.
pub fn trace_recorder(recorder: TraceRecorder) -> PostHook {
    Arc::new(move |ctx, result| {
        if !result.success {
            return Ok(());
        }
        let Some(path) = ctx.arg_str("path") else {
            return Ok(());
        };
        let content = ctx.arg_str("content").unwrap_or_default();
        let content_hash = spatial::hash(content);
        let session = recorder.sessions.get(&ctx.session_id)?;
        let intent_id = session.as_ref().and_then(|s| s.intent_id.clone());
        let model_id = session.as_ref().and_then(|s| s.model_id.clone());

        let classification = ctx
            .prior_content
            .as_deref()
            .filter(|prior| !prior.is_empty())
            .map(|prior| mutation::classify(prior, content));
        let (mutation_class, confidence) = match &classification {
            Some(c) => (Some(c.class), Some(c.confidence)),
            None => (None, None),
        };

        let mut related = Vec::new();
        if let Some(intent_id) = &intent_id {
            related.push(RelatedRef {
                kind: RelatedKind::Specification,
                value: intent_id.clone(),
                url: None,
            });
        }
        related.push(RelatedRef {
            kind: RelatedKind::ContentHash,
            value: content_hash.clone(),
            url: None,
        });

        let record = TraceRecord {
            uuid: uuid::Uuid::new_v4().to_string(),
            ts: crate::core::time::now_rfc3339(),
            vcs: recorder.vcs.revision(),
            files: vec![FileTrace {
                relative_path: path.to_string(),
                conversations: vec![Conversation {
                    contributor: Contributor {
                        kind: ContributorKind::Ai,
                        model_id,
                        session_id: Some(ctx.session_id.clone()),
                    },
                    ranges: vec![CodeRange {
                        start_line: 1,
                        end_line: content.lines().count().max(1) as u32,
                        content_hash,
                        mutation_class,
                        confidence,
                    }],
                    related,
                    mutation_class,
                }],
            }],
            metadata: TraceMetadata {
                session_id: Some(ctx.session_id.clone()),
                tags: vec![ctx.tool_name.clone()],
            },
        };
        recorder.traces.append(&record);

        if let Err(e) = intent_map::rebuild(&recorder.traces, &recorder.store.intent_map_path()) {
            recorder
                .audit
                .warn("intent_map.rebuild_failed", &e.to_string());
        }
        Ok(())
    })
}

/// Append a structured lesson entry for every failed call.
pub fn lesson_recorder(lessons: Arc<LessonLog>, sessions: Arc<SessionRegistry>) -> PostHook {
    Arc::new(move |ctx, result| {
        if result.success {
            return Ok(());
        }
        let Some(error) = &result.error else {
            return Ok(());
        };
        let intent_id = sessions.intent_of(&ctx.session_id)?;
        lessons.append(&LessonEntry {
            kind: "failure".into(),
            intent_id,
            tool: Some(ctx.tool_name.clone()),
            error_type: Some(error.kind.as_wire().to_string()),
            message: error.message.clone(),
            details: result
                .llm_error
                .as_ref()
                .and_then(|v| serde_json::to_string_pretty(v).ok()),
            resolution: error.suggestion.clone(),
            tags: vec![ctx.tool_name.clone(), error.kind.as_wire().to_lowercase()],
        })?;
        Ok(())
    })
}

/// Record which recovery strategy was handed to the agent.
pub fn recovery_logger(audit: AuditLog) -> PostHook {
    Arc::new(move |ctx, result| {
        if result.success {
            return Ok(());
        }
        let instruction = result
            .llm_error
            .as_ref()
            .and_then(|v| v.get("_recovery"))
            .and_then(|r| r.get("instruction"))
            .and_then(|i| i.as_str())
            .unwrap_or("none")
            .to_string();
        audit.append(
            "recovery.applied",
            "pass",
            EventDetail {
                tool: Some(&ctx.tool_name),
                session_id: Some(&ctx.session_id),
                detail: Some(&instruction),
                ..EventDetail::default()
            },
        );
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hooks::{HookContext, ToolResult};
    use crate::core::recovery::{ErrorKind, GateError};
    use crate::core::trace::VcsSnapshot;
    use crate::core::vcs::StaticProbe;
    use serde_json::{json, Map, Value};

    fn write_ctx(path: &str, content: &str, prior: Option<&str>) -> HookContext {
        let mut args = Map::new();
        args.insert("path".into(), Value::String(path.into()));
        args.insert("content".into(), Value::String(content.into()));
        let mut ctx = HookContext::new("write_to_file", args, "s-1");
        ctx.prior_content = prior.map(str::to_string);
        ctx
    }

    #[test]
    fn successful_write_appends_one_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path());
        store.ensure().unwrap();
        let traces = Arc::new(TraceStore::new(store.trace_journal_path()));
        let sessions = Arc::new(SessionRegistry::new());
        sessions.set_intent("s-1", "INT-001").unwrap();
        let hook = trace_recorder(TraceRecorder {
            traces: traces.clone(),
            sessions,
            vcs: Arc::new(StaticProbe(VcsSnapshot::unknown())),
            store: store.clone(),
            audit: AuditLog::new(store.governance_journal_path()),
        });

        let content = "export const f = 1;\n";
        let ctx = write_ctx("src/api/weather/fetch.ts", content, Some(""));
        hook(&ctx, &ToolResult::ok(Value::Null)).unwrap();

        let records = traces.by_intent("INT-001");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.files[0].relative_path, "src/api/weather/fetch.ts");
        assert_eq!(
            record.files[0].conversations[0].ranges[0].content_hash,
            spatial::hash(content)
        );
        assert!(store.intent_map_path().exists());
    }

    #[test]
    fn failed_write_appends_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path());
        store.ensure().unwrap();
        let traces = Arc::new(TraceStore::new(store.trace_journal_path()));
        let hook = trace_recorder(TraceRecorder {
            traces: traces.clone(),
            sessions: Arc::new(SessionRegistry::new()),
            vcs: Arc::new(StaticProbe(VcsSnapshot::unknown())),
            store: store.clone(),
            audit: AuditLog::new(store.governance_journal_path()),
        });
        let ctx = write_ctx("src/a.ts", "x", None);
        let result = ToolResult::blocked(
            GateError::new(ErrorKind::ScopeViolation, "nope"),
            Some(json!({"_recovery": {"instruction": "stay in scope"}})),
        );
        hook(&ctx, &result).unwrap();
        assert!(traces.all().is_empty());
    }

    #[test]
    fn lesson_recorder_writes_failures_only() {
        let tmp = tempfile::tempdir().unwrap();
        let lessons = Arc::new(LessonLog::new(tmp.path().join("lessons.md")));
        let sessions = Arc::new(SessionRegistry::new());
        sessions.set_intent("s-1", "INT-001").unwrap();
        let hook = lesson_recorder(lessons.clone(), sessions);

        let ctx = write_ctx("src/a.ts", "x", None);
        hook(&ctx, &ToolResult::ok(Value::Null)).unwrap();
        assert!(lessons.entries().is_empty());

        let result = ToolResult::blocked(
            GateError::new(ErrorKind::DestructiveCommand, "rm -rf blocked"),
            None,
        );
        hook(&ctx, &result).unwrap();
        let entries = lessons.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("- **Type:** DESTRUCTIVE_COMMAND"));
        assert!(entries[0].contains("- **Intent:** INT-001"));
    }
}
