//! Hook registration and the context threaded through the pipeline.
//!
//! Pre-hooks validate; post-hooks record. Hooks are ordered by
//! registration, global (`*`) before tool-specific. The `blocked` flag is
//! monotonic: once a hook blocks, later hooks may inspect but cannot unset
//! it, and the first block's error detail wins.

use crate::core::error::CorridorError;
use crate::core::recovery::GateError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Registration key matching every tool.
pub const WILDCARD_TOOL: &str = "*";

/// Result envelope returned by the pipeline and by wrapped tools.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<GateError>,
    /// Serialized recovery payload for the agent
    pub llm_error: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            llm_error: None,
        }
    }

    pub fn blocked(error: GateError, llm_error: Option<Value>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error),
            llm_error,
        }
    }
}

/// Mutable state carried through one tool call.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub tool_name: String,
    pub args: Map<String, Value>,
    pub session_id: String,
    blocked: bool,
    pub error: Option<GateError>,
    pub llm_error: Option<Value>,
    pub user_feedback: Option<String>,
    /// Normalized path of a lock acquired during pre-hooks, for the
    /// releaser post-hook
    pub acquired_lock: Option<String>,
    /// On-disk content captured before the write, for mutation
    /// classification
    pub prior_content: Option<String>,
}

impl HookContext {
    pub fn new(tool_name: &str, args: Map<String, Value>, session_id: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            args,
            session_id: session_id.to_string(),
            blocked: false,
            error: None,
            llm_error: None,
            user_feedback: None,
            acquired_lock: None,
            prior_content: None,
        }
    }

    /// Block the call. Monotonic: the first block wins and cannot be unset.
    pub fn block(&mut self, error: GateError, llm_error: Value) {
        if self.blocked {
            return;
        }
        self.blocked = true;
        self.error = Some(error);
        self.llm_error = Some(llm_error);
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// String argument accessor for hook bodies.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

pub type PreHook = Arc<dyn Fn(&mut HookContext) -> Result<(), CorridorError> + Send + Sync>;
pub type PostHook =
    Arc<dyn Fn(&HookContext, &ToolResult) -> Result<(), CorridorError> + Send + Sync>;

#[derive(Clone)]
pub struct NamedPreHook {
    pub name: String,
    pub hook: PreHook,
}

#[derive(Clone)]
pub struct NamedPostHook {
    pub name: String,
    pub hook: PostHook,
}

/// Ordered per-tool and global hook tables.
#[derive(Default)]
pub struct HookRegistry {
    pre: HashMap<String, Vec<NamedPreHook>>,
    post: HashMap<String, Vec<NamedPostHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-hook for `tool` (or [`WILDCARD_TOOL`] for all tools).
    pub fn register_pre(&mut self, tool: &str, name: &str, hook: PreHook) {
        self.pre
            .entry(tool.to_string())
            .or_default()
            .push(NamedPreHook {
                name: name.to_string(),
                hook,
            });
    }

    pub fn register_post(&mut self, tool: &str, name: &str, hook: PostHook) {
        self.post
            .entry(tool.to_string())
            .or_default()
            .push(NamedPostHook {
                name: name.to_string(),
                hook,
            });
    }

    /// Pre-hooks for one call: global first, then tool-specific, each in
    /// registration order.
    pub fn pre_for(&self, tool: &str) -> Vec<NamedPreHook> {
        let mut hooks = Vec::new();
        if let Some(global) = self.pre.get(WILDCARD_TOOL) {
            hooks.extend(global.iter().cloned());
        }
        if tool != WILDCARD_TOOL {
            if let Some(specific) = self.pre.get(tool) {
                hooks.extend(specific.iter().cloned());
            }
        }
        hooks
    }

    pub fn post_for(&self, tool: &str) -> Vec<NamedPostHook> {
        let mut hooks = Vec::new();
        if let Some(global) = self.post.get(WILDCARD_TOOL) {
            hooks.extend(global.iter().cloned());
        }
        if tool != WILDCARD_TOOL {
            if let Some(specific) = self.post.get(tool) {
                hooks.extend(specific.iter().cloned());
            }
        }
        hooks
    }

    /// Health probe used by the fallback pipeline: the tables must be
    /// enumerable.
    pub fn probe(&self) -> bool {
        let _ = self.pre_for("__probe__");
        let _ = self.post_for("__probe__");
        true
    }

    pub fn pre_count(&self) -> usize {
        self.pre.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recovery::ErrorKind;

    #[test]
    fn block_is_monotonic() {
        let mut ctx = HookContext::new("write_to_file", Map::new(), "s-1");
        ctx.block(
            GateError::new(ErrorKind::IntentRequired, "first"),
            Value::Null,
        );
        ctx.block(
            GateError::new(ErrorKind::ScopeViolation, "second"),
            Value::Null,
        );
        assert!(ctx.is_blocked());
        assert_eq!(ctx.error.unwrap().kind, ErrorKind::IntentRequired);
    }

    #[test]
    fn global_hooks_run_before_tool_specific() {
        let mut registry = HookRegistry::new();
        registry.register_pre(
            "write_to_file",
            "specific",
            Arc::new(|_ctx| Ok(())),
        );
        registry.register_pre(WILDCARD_TOOL, "global", Arc::new(|_ctx| Ok(())));
        let order: Vec<String> = registry
            .pre_for("write_to_file")
            .iter()
            .map(|h| h.name.clone())
            .collect();
        assert_eq!(order, vec!["global".to_string(), "specific".to_string()]);
    }

    #[test]
    fn registration_order_is_preserved_within_a_tool() {
        let mut registry = HookRegistry::new();
        for name in ["a", "b", "c"] {
            registry.register_pre("execute_command", name, Arc::new(|_ctx| Ok(())));
        }
        let order: Vec<String> = registry
            .pre_for("execute_command")
            .iter()
            .map(|h| h.name.clone())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
