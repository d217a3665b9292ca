//! Process-wide service wiring.
//!
//! The shared services (ignore rules, lock manager, session registry,
//! trace store) are constructed once here and handed to the pipeline by
//! dependency injection; tests build fresh `Governor`s over tempdirs
//! instead of sharing globals.

use crate::core::approval::{ApprovalLedger, UserApprovalPort};
use crate::core::audit::AuditLog;
use crate::core::error::CorridorError;
use crate::core::hooks::{HookRegistry, ToolResult, WILDCARD_TOOL};
use crate::core::locks::{LockManager, REAPER_INTERVAL_SECS};
use crate::core::pipeline::{FallbackPipeline, Pipeline};
use crate::core::session::SessionRegistry;
use crate::core::store::Store;
use crate::core::time;
use crate::core::trace::TraceStore;
use crate::core::vcs::VcsProbe;
use crate::plugins::ignore_rules::IgnoreIndex;
use crate::plugins::intents::IntentStore;
use crate::plugins::lesson::LessonLog;
use crate::plugins::select_intent::{self, SELECT_INTENT_TOOL};
use crate::plugins::{command_gate, gatekeeper, recorders, scope_gate, stale_gate};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Tool names the default hook set interposes on.
pub const WRITE_TOOL: &str = "write_to_file";
pub const COMMAND_TOOL: &str = "execute_command";

/// The assembled governance middleware for one workspace.
pub struct Governor {
    pub store: Store,
    pub intents: Arc<IntentStore>,
    pub ignore: Arc<IgnoreIndex>,
    pub locks: Arc<LockManager>,
    pub sessions: Arc<SessionRegistry>,
    pub traces: Arc<TraceStore>,
    pub lessons: Arc<LessonLog>,
    pub ledger: Arc<ApprovalLedger>,
    pub audit: AuditLog,
    pipeline: FallbackPipeline,
}

impl Governor {
    /// Build the full default pipeline over a workspace.
    pub fn bootstrap(
        workspace_root: &Path,
        approval: Arc<dyn UserApprovalPort>,
        vcs: Arc<dyn VcsProbe>,
    ) -> Result<Self, CorridorError> {
        let store = Store::new(workspace_root);
        store.ensure()?;
        let audit = AuditLog::new(store.governance_journal_path());

        let intents = Arc::new(IntentStore::new(store.intents_path()));
        let ignore = Arc::new(IgnoreIndex::load(&store.ignore_path()));
        let locks = Arc::new(
            LockManager::new(store.workspace_root.clone()).with_audit(audit.clone()),
        );
        let sessions = Arc::new(SessionRegistry::new());
        let traces = Arc::new(
            TraceStore::new(store.trace_journal_path()).with_audit(audit.clone()),
        );
        let lessons = Arc::new(LessonLog::new(store.lesson_log_path()));
        let ledger = Arc::new(ApprovalLedger::open(store.approvals_db_path())?);

        let mut registry = HookRegistry::new();

        // Pre-hooks. The gatekeeper is global and runs first; the
        // write-path gates run in registration order after it.
        registry.register_pre(
            WILDCARD_TOOL,
            "intent_gatekeeper",
            gatekeeper::make_hook(sessions.clone()),
        );
        registry.register_pre(
            COMMAND_TOOL,
            "command_classifier",
            command_gate::make_hook(command_gate::CommandGate {
                ignore: ignore.clone(),
                sessions: sessions.clone(),
                approval: approval.clone(),
                ledger: ledger.clone(),
                audit: audit.clone(),
            }),
        );
        registry.register_pre(
            WRITE_TOOL,
            "scope_enforcer",
            scope_gate::make_hook(scope_gate::ScopeGate {
                intents: intents.clone(),
                ignore: ignore.clone(),
                sessions: sessions.clone(),
                approval,
            }),
        );
        registry.register_pre(
            WRITE_TOOL,
            "stale_file_detector",
            stale_gate::make_hook(locks.clone()),
        );

        // Post-hooks. Global recorders observe every failure; the write
        // tool additionally releases its lock and records its trace.
        registry.register_post(
            WILDCARD_TOOL,
            "lesson_recorder",
            recorders::lesson_recorder(lessons.clone(), sessions.clone()),
        );
        registry.register_post(
            WILDCARD_TOOL,
            "recovery_logger",
            recorders::recovery_logger(audit.clone()),
        );
        registry.register_post(
            WRITE_TOOL,
            "lock_releaser",
            recorders::lock_releaser(locks.clone()),
        );
        registry.register_post(
            WRITE_TOOL,
            "trace_recorder",
            recorders::trace_recorder(recorders::TraceRecorder {
                traces: traces.clone(),
                sessions: sessions.clone(),
                vcs,
                store: store.clone(),
                audit: audit.clone(),
            }),
        );

        let primary = Pipeline::new(registry, sessions.clone(), audit.clone());
        let pipeline = FallbackPipeline::new(primary, audit.clone());

        Ok(Self {
            store,
            intents,
            ignore,
            locks,
            sessions,
            traces,
            lessons,
            ledger,
            audit,
            pipeline,
        })
    }

    /// Route one tool call through the governed pipeline.
    pub fn execute<F>(
        &self,
        tool_name: &str,
        args: Map<String, Value>,
        session_id: &str,
        next: F,
    ) -> ToolResult
    where
        F: FnOnce(&Map<String, Value>) -> ToolResult,
    {
        self.pipeline.execute(tool_name, args, session_id, next)
    }

    /// Invoke the `select_intent` tool for a session.
    pub fn select_intent(&self, session_id: &str, args: Map<String, Value>) -> ToolResult {
        let intents = self.intents.clone();
        let sessions = self.sessions.clone();
        let traces = self.traces.clone();
        let session = session_id.to_string();
        self.pipeline
            .execute(SELECT_INTENT_TOOL, args, session_id, move |call_args| {
                select_intent::run(&intents, &sessions, &traces, &session, call_args)
            })
    }

    /// Record a read-version for a file the session just read.
    pub fn register_read(&self, path: &str, session_id: &str) -> Result<String, CorridorError> {
        let _ = self.sessions.touch(session_id);
        self.locks.register_read(path, session_id)
    }

    /// One maintenance tick: reap stale locks, expire idle sessions, and
    /// drop the expired sessions' lock state.
    pub fn reap(&self) {
        self.reap_at(time::now_epoch_secs());
    }

    /// Maintenance tick against an explicit clock, for deterministic tests.
    pub fn reap_at(&self, now: u64) {
        let _ = self.locks.reap_stale(now);
        if let Ok(expired) = self.sessions.expire_idle(now) {
            for session_id in expired {
                let _ = self.locks.forget_session(&session_id);
                self.audit
                    .warn("sessions.expired", &format!("session {} expired", session_id));
            }
        }
    }

    /// Start the background reaper thread. The handle stops it on drop.
    pub fn spawn_reaper(&self) -> ReaperHandle {
        let locks = self.locks.clone();
        let sessions = self.sessions.clone();
        let audit = self.audit.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        thread::spawn(move || {
            let mut slept = 0u64;
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(1));
                slept += 1;
                if slept < REAPER_INTERVAL_SECS {
                    continue;
                }
                slept = 0;
                let now = time::now_epoch_secs();
                let _ = locks.reap_stale(now);
                if let Ok(expired) = sessions.expire_idle(now) {
                    for session_id in expired {
                        let _ = locks.forget_session(&session_id);
                        audit.warn(
                            "sessions.expired",
                            &format!("session {} expired", session_id),
                        );
                    }
                }
            }
        });
        ReaperHandle { stop }
    }

    pub fn in_bypass(&self) -> bool {
        self.pipeline.in_bypass()
    }
}

/// Stops the background reaper when dropped.
pub struct ReaperHandle {
    stop: Arc<AtomicBool>,
}

impl ReaperHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
