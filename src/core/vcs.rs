//! Revision metadata probe.
//!
//! Trace records carry a VCS snapshot. The probe is an outbound port;
//! the default implementation shells out to git and degrades to
//! `revision_id = "unknown"` on any failure.

use crate::core::trace::VcsSnapshot;
use std::path::PathBuf;
use std::process::Command;

pub trait VcsProbe: Send + Sync {
    fn revision(&self) -> VcsSnapshot;
}

/// Probes via the `git` CLI.
pub struct GitCliProbe {
    workspace_root: PathBuf,
}

impl GitCliProbe {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }

    fn git(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workspace_root)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VcsProbe for GitCliProbe {
    fn revision(&self) -> VcsSnapshot {
        let Some(revision_id) = self.git(&["rev-parse", "HEAD"]) else {
            return VcsSnapshot::unknown();
        };
        let branch = self
            .git(&["rev-parse", "--abbrev-ref", "HEAD"])
            .filter(|b| b != "HEAD");
        let dirty = self
            .git(&["status", "--porcelain"])
            .map(|s| !s.is_empty());
        VcsSnapshot {
            revision_id,
            branch,
            dirty,
        }
    }
}

/// Fixed snapshot, for tests and non-git workspaces.
pub struct StaticProbe(pub VcsSnapshot);

impl VcsProbe for StaticProbe {
    fn revision(&self) -> VcsSnapshot {
        self.0.clone()
    }
}
