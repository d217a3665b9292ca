//! Declarative intent store and scope validation.
//!
//! Intents are read-only at runtime, declared in `intents.yaml` under the
//! root key `active_intents`. A missing or malformed store never crashes
//! the middleware: `load` fails open to an empty list, and every gate check
//! downstream then fails closed via `not found`.

use crate::core::glob;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Active,
    Completed,
    Paused,
}

/// A declared, scoped unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    pub name: String,
    pub status: IntentStatus,
    #[serde(default)]
    pub owned_scope: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IntentFile {
    #[serde(default)]
    active_intents: Vec<Intent>,
}

/// Read-only store over the declarative intent document.
pub struct IntentStore {
    path: PathBuf,
}

impl IntentStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parse the store. Any I/O or parse failure yields an empty list.
    pub fn load(&self) -> Vec<Intent> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_yaml::from_str::<IntentFile>(&content) {
            Ok(file) => file.active_intents,
            Err(_) => Vec::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Intent> {
        self.load().into_iter().find(|i| i.id == id)
    }
}

/// Whether `path` falls inside the intent's owned scope.
///
/// A path is in scope if it matches any scope glob. An empty scope list
/// means nothing is in scope (a read-only intent). Pure and stable under
/// repeated calls.
pub fn scope_matches(intent: &Intent, path: &str) -> bool {
    let candidate = path.replace('\\', "/");
    intent
        .owned_scope
        .iter()
        .any(|pattern| glob::glob_match(pattern, &candidate))
}
