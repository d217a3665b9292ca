//! Append-only trace journal linking code regions to intents.
//!
//! One `TraceRecord` per accepted mutation, one JSON object per line.
//! Records are never modified after being appended; readers must ignore
//! unknown fields. Queries scan the journal and skip malformed lines.
//!
//! The `by_content_hash` query is the spatial-independence lookup: it
//! locates code by what it is, not where it lives.

use crate::core::audit::AuditLog;
use crate::core::error::CorridorError;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Closed taxonomy of code mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationClass {
    AstRefactor,
    IntentEvolution,
    BugFix,
    PerfImprovement,
    DocsUpdate,
}

impl std::fmt::Display for MutationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AstRefactor => "AST_REFACTOR",
            Self::IntentEvolution => "INTENT_EVOLUTION",
            Self::BugFix => "BUG_FIX",
            Self::PerfImprovement => "PERF_IMPROVEMENT",
            Self::DocsUpdate => "DOCS_UPDATE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContributorKind {
    Human,
    #[serde(rename = "AI")]
    Ai,
    Mixed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedKind {
    Specification,
    Issue,
    Pr,
    Discussion,
    DesignDoc,
    ContentHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsSnapshot {
    pub revision_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirty: Option<bool>,
}

impl VcsSnapshot {
    pub fn unknown() -> Self {
        Self {
            revision_id: "unknown".to_string(),
            branch: None,
            dirty: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    pub kind: ContributorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRange {
    pub start_line: u32,
    pub end_line: u32,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_class: Option<MutationClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedRef {
    pub kind: RelatedKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub contributor: Contributor,
    pub ranges: Vec<CodeRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_class: Option<MutationClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTrace {
    pub relative_path: String,
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One appended journal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub uuid: String,
    /// RFC 3339
    pub ts: String,
    pub vcs: VcsSnapshot,
    pub files: Vec<FileTrace>,
    #[serde(default)]
    pub metadata: TraceMetadata,
}

impl TraceRecord {
    /// Iterate every `related` entry across files and conversations.
    pub fn related(&self) -> impl Iterator<Item = &RelatedRef> {
        self.files
            .iter()
            .flat_map(|f| f.conversations.iter())
            .flat_map(|c| c.related.iter())
    }

    /// The intent id this record is attributed to, if any.
    pub fn intent_id(&self) -> Option<&str> {
        self.related()
            .find(|r| r.kind == RelatedKind::Specification)
            .map(|r| r.value.as_str())
    }
}

/// Append-only journal with single-writer discipline.
pub struct TraceStore {
    journal_path: PathBuf,
    write_lock: Mutex<()>,
    audit: Option<AuditLog>,
}

impl TraceStore {
    pub fn new(journal_path: PathBuf) -> Self {
        Self {
            journal_path,
            write_lock: Mutex::new(()),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Serialize one record as a single JSON line and append it.
    ///
    /// Write failures are logged and swallowed: tracing never blocks the
    /// caller or propagates.
    pub fn append(&self, record: &TraceRecord) {
        let Ok(json) = serde_json::to_string(record) else {
            self.warn("trace.append_failed", "record serialization failed");
            return;
        };
        let Ok(_guard) = self.write_lock.lock() else {
            self.warn("trace.append_failed", "journal write lock poisoned");
            return;
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .and_then(|mut f| writeln!(f, "{}", json));
        if let Err(e) = result {
            self.warn("trace.append_failed", &e.to_string());
        }
    }

    /// Records attributed to an intent via a `specification` related entry.
    pub fn by_intent(&self, intent_id: &str) -> Vec<TraceRecord> {
        self.scan(|record| {
            record
                .related()
                .any(|r| r.kind == RelatedKind::Specification && r.value == intent_id)
        })
    }

    /// Records containing a file entry matching `path`. Suffix match is
    /// allowed to tolerate absolute-vs-relative differences.
    pub fn by_file(&self, path: &str) -> Vec<TraceRecord> {
        self.scan(|record| {
            record.files.iter().any(|f| {
                f.relative_path == path
                    || f.relative_path.ends_with(path)
                    || path.ends_with(&f.relative_path)
            })
        })
    }

    /// Records (with the owning file path) holding a range whose
    /// `content_hash` equals `hash`.
    pub fn by_content_hash(&self, hash: &str) -> Vec<(TraceRecord, String)> {
        let mut out = Vec::new();
        for record in self.scan(|_| true) {
            for file in &record.files {
                let hit = file
                    .conversations
                    .iter()
                    .flat_map(|c| c.ranges.iter())
                    .any(|r| r.content_hash == hash);
                if hit {
                    out.push((record.clone(), file.relative_path.clone()));
                }
            }
        }
        out
    }

    /// The most recent `n` records for an intent, newest last.
    pub fn recent_for_intent(&self, intent_id: &str, n: usize) -> Vec<TraceRecord> {
        let mut records = self.by_intent(intent_id);
        if records.len() > n {
            records.drain(..records.len() - n);
        }
        records
    }

    /// All parseable records, in journal order.
    pub fn all(&self) -> Vec<TraceRecord> {
        self.scan(|_| true)
    }

    fn scan<F: Fn(&TraceRecord) -> bool>(&self, keep: F) -> Vec<TraceRecord> {
        let Ok(file) = File::open(&self.journal_path) else {
            return Vec::new();
        };
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TraceRecord>(&line) {
                Ok(record) if keep(&record) => out.push(record),
                _ => continue,
            }
        }
        out
    }

    fn warn(&self, op: &str, detail: &str) {
        if let Some(audit) = &self.audit {
            audit.warn(op, detail);
        }
    }
}
