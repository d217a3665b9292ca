//! The interposition engine.
//!
//! Every tool call routes through `Pipeline::execute`: pre-hooks run in
//! order inside per-hook failure boundaries, a block short-circuits before
//! the wrapped tool runs, post-hooks record the outcome. Policy errors
//! fail closed; internal errors fail open. The pipeline itself never
//! panics the host: anything it cannot handle becomes a recoverable
//! `HOOK_ERROR` payload.
//!
//! `FallbackPipeline` wraps the primary. After a catastrophic pipeline
//! failure it runs tools in bypass mode (hooks disabled) for up to 60
//! seconds, re-probing the primary's health on each call so governance is
//! reinstated as soon as possible. The middleware must never wedge the
//! host agent.

use crate::core::audit::{AuditLog, EventDetail};
use crate::core::error::CorridorError;
use crate::core::hooks::{HookContext, HookRegistry, ToolResult};
use crate::core::recovery::{self, ErrorKind, GateError, RecoveryDetails};
use crate::core::session::SessionRegistry;
use crate::core::time;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// How long bypass mode persists after a catastrophic failure.
pub const BYPASS_WINDOW_SECS: u64 = 60;

pub struct Pipeline {
    registry: HookRegistry,
    sessions: Arc<SessionRegistry>,
    audit: AuditLog,
}

impl Pipeline {
    pub fn new(registry: HookRegistry, sessions: Arc<SessionRegistry>, audit: AuditLog) -> Self {
        Self {
            registry,
            sessions,
            audit,
        }
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Run one tool call through the full hook pipeline.
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
        match self.try_execute(tool_name, args, session_id, next) {
            Ok(result) => result,
            Err(e) => self.hook_error_result(tool_name, session_id, &e),
        }
    }

    /// Like `execute` but surfaces catastrophic pipeline failures to the
    /// caller (used by the fallback wrapper to trip bypass mode).
    pub fn try_execute<F>(
        &self,
        tool_name: &str,
        args: Map<String, Value>,
        session_id: &str,
        next: F,
    ) -> Result<ToolResult, CorridorError>
    where
        F: FnOnce(&Map<String, Value>) -> ToolResult,
    {
        self.sessions.touch(session_id)?;
        let mut ctx = HookContext::new(tool_name, args, session_id);

        for named in self.registry.pre_for(tool_name) {
            // Per-hook failure boundary: a failing hook is logged and the
            // iteration continues with the context it could not touch.
            let mut attempt = ctx.clone();
            match (named.hook)(&mut attempt) {
                Ok(()) => ctx = attempt,
                Err(e) => {
                    self.audit.append(
                        "pipeline.pre_hook_failed",
                        "warn",
                        EventDetail {
                            tool: Some(tool_name),
                            session_id: Some(session_id),
                            detail: Some(&format!("{}: {}", named.name, e)),
                            ..EventDetail::default()
                        },
                    );
                }
            }
            if ctx.is_blocked() {
                break;
            }
        }

        let result = if ctx.is_blocked() {
            let _ = self.sessions.record_block(session_id);
            let error = ctx.error.clone().unwrap_or_else(|| {
                GateError::new(ErrorKind::HookError, "blocked without error detail")
            });
            self.audit.append(
                "pipeline.block",
                "block",
                EventDetail {
                    tool: Some(tool_name),
                    session_id: Some(session_id),
                    detail: Some(error.kind.as_wire()),
                    ..EventDetail::default()
                },
            );
            ToolResult::blocked(error, ctx.llm_error.clone())
        } else {
            let result = next(&ctx.args);
            self.audit.append(
                "pipeline.pass",
                if result.success { "pass" } else { "error" },
                EventDetail {
                    tool: Some(tool_name),
                    session_id: Some(session_id),
                    ..EventDetail::default()
                },
            );
            result
        };

        self.fire_post_hooks(&ctx, &result);
        Ok(result)
    }

    /// Post-hooks observe both successes and failures, each inside its own
    /// failure boundary; nothing they do changes the returned result.
    fn fire_post_hooks(&self, ctx: &HookContext, result: &ToolResult) {
        for named in self.registry.post_for(&ctx.tool_name) {
            if let Err(e) = (named.hook)(ctx, result) {
                self.audit.append(
                    "pipeline.post_hook_failed",
                    "warn",
                    EventDetail {
                        tool: Some(&ctx.tool_name),
                        session_id: Some(&ctx.session_id),
                        detail: Some(&format!("{}: {}", named.name, e)),
                        ..EventDetail::default()
                    },
                );
            }
        }
    }

    fn hook_error_result(
        &self,
        tool_name: &str,
        session_id: &str,
        e: &CorridorError,
    ) -> ToolResult {
        let error = GateError::new(ErrorKind::HookError, e.to_string());
        let payload = recovery::recovery_payload(&error, &RecoveryDetails::default());
        self.audit.append(
            "pipeline.hook_error",
            "error",
            EventDetail {
                tool: Some(tool_name),
                session_id: Some(session_id),
                detail: Some(&e.to_string()),
                ..EventDetail::default()
            },
        );
        ToolResult::blocked(error, Some(payload))
    }

    /// Health probe for the fallback wrapper.
    pub fn health_check(&self) -> bool {
        self.registry.probe() && self.sessions.live_count().is_ok()
    }
}

/// Bypass wrapper guaranteeing the middleware cannot wedge the host.
pub struct FallbackPipeline {
    primary: Pipeline,
    /// Epoch seconds until which bypass mode holds; 0 when healthy.
    bypass_until: Mutex<u64>,
    audit: AuditLog,
}

impl FallbackPipeline {
    pub fn new(primary: Pipeline, audit: AuditLog) -> Self {
        Self {
            primary,
            bypass_until: Mutex::new(0),
            audit,
        }
    }

    pub fn primary(&self) -> &Pipeline {
        &self.primary
    }

    pub fn in_bypass(&self) -> bool {
        self.bypass_until
            .lock()
            .map(|until| *until > time::now_epoch_secs())
            .unwrap_or(false)
    }

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
        let now = time::now_epoch_secs();
        if let Ok(mut until) = self.bypass_until.lock() {
            if *until > now {
                // Probe each call; reinstate the primary as soon as it
                // answers.
                if self.primary.health_check() {
                    *until = 0;
                    self.audit.append(
                        "pipeline.reinstate",
                        "pass",
                        EventDetail {
                            tool: Some(tool_name),
                            ..EventDetail::default()
                        },
                    );
                } else {
                    self.audit.append(
                        "pipeline.bypass",
                        "bypass",
                        EventDetail {
                            tool: Some(tool_name),
                            session_id: Some(session_id),
                            ..EventDetail::default()
                        },
                    );
                    return next(&args);
                }
            }
        }

        match self.primary.try_execute(tool_name, args, session_id, next) {
            Ok(result) => result,
            Err(e) => {
                if let Ok(mut until) = self.bypass_until.lock() {
                    *until = time::now_epoch_secs() + BYPASS_WINDOW_SECS;
                }
                self.audit.append(
                    "pipeline.bypass_engaged",
                    "error",
                    EventDetail {
                        tool: Some(tool_name),
                        session_id: Some(session_id),
                        detail: Some(&e.to_string()),
                        ..EventDetail::default()
                    },
                );
                let error = GateError::new(ErrorKind::HookError, e.to_string());
                let payload = recovery::recovery_payload(&error, &RecoveryDetails::default());
                ToolResult::blocked(error, Some(payload))
            }
        }
    }
}
