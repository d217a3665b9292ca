//! Workspace-rooted storage layout.
//!
//! All Corridor state for a workspace lives under `<workspace>/.corridor/`:
//! the declarative intent store, the ignore rules file, the append-only
//! trace journal and governance event journal, the lesson log, the derived
//! intent map, and the remembered-approval ledger.

use crate::core::error::CorridorError;
use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = ".corridor";
pub const INTENTS_FILE: &str = "intents.yaml";
pub const IGNORE_FILE: &str = "ignore.rules";
pub const TRACE_JOURNAL: &str = "traces.jsonl";
pub const GOVERNANCE_JOURNAL: &str = "governance.events.jsonl";
pub const LESSON_LOG: &str = "lessons.md";
pub const INTENT_MAP: &str = "intent_map.md";
pub const APPROVALS_DB: &str = "approvals.db";

/// Resolved storage handle for one workspace.
#[derive(Debug, Clone)]
pub struct Store {
    pub workspace_root: PathBuf,
    pub data_root: PathBuf,
}

impl Store {
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            workspace_root: workspace_root.to_path_buf(),
            data_root: workspace_root.join(DATA_DIR),
        }
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure(&self) -> Result<(), CorridorError> {
        std::fs::create_dir_all(&self.data_root).map_err(CorridorError::IoError)
    }

    pub fn intents_path(&self) -> PathBuf {
        self.data_root.join(INTENTS_FILE)
    }

    pub fn ignore_path(&self) -> PathBuf {
        self.data_root.join(IGNORE_FILE)
    }

    pub fn trace_journal_path(&self) -> PathBuf {
        self.data_root.join(TRACE_JOURNAL)
    }

    pub fn governance_journal_path(&self) -> PathBuf {
        self.data_root.join(GOVERNANCE_JOURNAL)
    }

    pub fn lesson_log_path(&self) -> PathBuf {
        self.data_root.join(LESSON_LOG)
    }

    pub fn intent_map_path(&self) -> PathBuf {
        self.data_root.join(INTENT_MAP)
    }

    pub fn approvals_db_path(&self) -> PathBuf {
        self.data_root.join(APPROVALS_DB)
    }

    /// Resolve a tool-supplied relative path against the workspace root.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.workspace_root.join(relative)
    }
}
