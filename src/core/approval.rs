//! User approval port and the remembered-approval ledger.
//!
//! Hooks that hit a policy boundary (destructive command, scope violation)
//! surface the decision to the human through `UserApprovalPort`. The port
//! is synchronous from the hook's point of view; the host editor owns the
//! actual modal.
//!
//! Decisions carrying `remember = true` are persisted in a SQLite ledger
//! keyed by a SHA-256 fingerprint of the action, so identical requests skip
//! the modal on later calls.

use crate::core::db;
use crate::core::error::CorridorError;
use crate::core::time;
use crate::plugins::command_risk::CommandClassification;
use crate::plugins::intents::Intent;
use rusqlite::params;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use ulid::Ulid;

/// Outcome of a confirmation modal.
#[derive(Debug, Clone, Default)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub feedback: Option<String>,
    pub remember: bool,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            ..Self::default()
        }
    }

    pub fn reject() -> Self {
        Self::default()
    }
}

/// Outbound port to the host editor's approval modals.
pub trait UserApprovalPort: Send + Sync {
    fn confirm_destructive(
        &self,
        command: &str,
        classification: &CommandClassification,
        intent_id: Option<&str>,
    ) -> ApprovalDecision;

    fn confirm_scope_violation(
        &self,
        intent: &Intent,
        path: &str,
        scopes: &[String],
    ) -> ApprovalDecision;

    fn confirm_intent_evolution(&self, intent_id: &str, summary: &str) -> ApprovalDecision;
}

/// Rejects everything. The safe default when no host is wired.
pub struct DenyAll;

impl UserApprovalPort for DenyAll {
    fn confirm_destructive(
        &self,
        _command: &str,
        _classification: &CommandClassification,
        _intent_id: Option<&str>,
    ) -> ApprovalDecision {
        ApprovalDecision::reject()
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

const LEDGER_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS approvals (
        approval_id TEXT PRIMARY KEY,
        action_fingerprint TEXT NOT NULL,
        action TEXT NOT NULL,
        actor TEXT NOT NULL,
        ts TEXT NOT NULL,
        scope TEXT NOT NULL
    )
";
const LEDGER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_approvals_fingerprint ON approvals(action_fingerprint)";

/// A remembered approval row.
#[derive(Debug, Clone)]
pub struct RememberedApproval {
    pub approval_id: String,
    pub action: String,
    pub actor: String,
    pub ts: String,
    pub scope: String,
}

/// Fingerprint an action for ledger lookup.
pub fn derive_fingerprint(action: &str, target: Option<&str>, scope: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(action);
    hasher.update(target.unwrap_or(""));
    hasher.update(scope);
    format!("{:x}", hasher.finalize())
}

/// SQLite-backed store of remembered approvals.
pub struct ApprovalLedger {
    db_path: PathBuf,
}

impl ApprovalLedger {
    pub fn open(db_path: PathBuf) -> Result<Self, CorridorError> {
        let conn = db::db_connect(&db_path)?;
        conn.execute(LEDGER_SCHEMA, [])?;
        conn.execute(LEDGER_INDEX, [])?;
        Ok(Self { db_path })
    }

    pub fn record(
        &self,
        action: &str,
        target: Option<&str>,
        actor: &str,
        scope: &str,
    ) -> Result<String, CorridorError> {
        let approval_id = Ulid::new().to_string();
        let fingerprint = derive_fingerprint(action, target, scope);
        let conn = db::db_connect(&self.db_path)?;
        conn.execute(
            "INSERT INTO approvals(approval_id, action_fingerprint, action, actor, ts, scope) \
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                approval_id,
                fingerprint,
                action,
                actor,
                time::now_rfc3339(),
                scope
            ],
        )?;
        Ok(approval_id)
    }

    pub fn is_remembered(
        &self,
        action: &str,
        target: Option<&str>,
        scope: &str,
    ) -> Result<bool, CorridorError> {
        let fingerprint = derive_fingerprint(action, target, scope);
        let conn = db::db_connect(&self.db_path)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM approvals WHERE action_fingerprint = ?1",
            params![fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list(&self) -> Result<Vec<RememberedApproval>, CorridorError> {
        let conn = db::db_connect(&self.db_path)?;
        let mut stmt =
            conn.prepare("SELECT approval_id, action, actor, ts, scope FROM approvals ORDER BY ts")?;
        let rows = stmt.query_map([], |row| {
            Ok(RememberedApproval {
                approval_id: row.get(0)?,
                action: row.get(1)?,
                actor: row.get(2)?,
                ts: row.get(3)?,
                scope: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
