//! Shell command risk classification.
//!
//! Table-driven: an ordered list of destructive patterns is consulted
//! before an ordered safe list; first match wins. Anything unmatched is
//! `unknown`, and callers treat `unknown` like `destructive` when deciding
//! whether to ask for approval.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandRisk {
    Safe,
    Destructive,
    Unknown,
}

/// Classification result for one command string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandClassification {
    pub risk: CommandRisk,
    /// Name of the matched pattern, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Safer alternative to suggest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
}

impl CommandClassification {
    /// `unknown` is treated like `destructive` for approval purposes.
    pub fn needs_approval(&self) -> bool {
        !matches!(self.risk, CommandRisk::Safe)
    }
}

struct DestructivePattern {
    name: &'static str,
    regex: Regex,
    reason: &'static str,
    alternative: Option<&'static str>,
}

fn pat(
    name: &'static str,
    regex: &str,
    reason: &'static str,
    alternative: Option<&'static str>,
) -> DestructivePattern {
    DestructivePattern {
        name,
        regex: Regex::new(&format!("(?i){}", regex)).unwrap(),
        reason,
        alternative,
    }
}

static DESTRUCTIVE_PATTERNS: LazyLock<Vec<DestructivePattern>> = LazyLock::new(|| {
    vec![
        pat(
            "recursive-delete",
            r"rm\s+-rf",
            "recursively deletes files without confirmation",
            Some("rm -i, or move to a trash directory first"),
        ),
        pat(
            "rmdir-subtree",
            r"rmdir\s+/s",
            "removes a directory tree",
            None,
        ),
        pat("format-volume", r"\bformat\b", "formats a volume", None),
        pat("mkfs", r"\bmkfs", "creates a filesystem, destroying contents", None),
        pat(
            "dd-write",
            r"dd\s+if=",
            "raw block copy can overwrite devices",
            None,
        ),
        pat(
            "git-force-push",
            r"git\s+push\s+--force",
            "rewrites remote history",
            Some("git push --force-with-lease"),
        ),
        pat(
            "git-hard-reset",
            r"git\s+reset\s+--hard",
            "discards uncommitted work",
            Some("git stash, then reset"),
        ),
        pat(
            "git-clean",
            r"git\s+clean\s+-f",
            "deletes untracked files",
            Some("git clean -n to preview first"),
        ),
        pat("drop-table", r"drop\s+table", "drops a database table", None),
        pat(
            "drop-database",
            r"drop\s+database",
            "drops an entire database",
            None,
        ),
        pat(
            "sql-delete",
            r"delete\s+from\s+\w+\s+where",
            "deletes rows from a table",
            Some("run a SELECT with the same WHERE clause first"),
        ),
        pat(
            "chmod-777",
            r"chmod\s+777",
            "makes files world-writable",
            Some("chmod with a narrower mode"),
        ),
        pat("chown", r"\bchown\b", "changes file ownership", None),
        pat("shutdown", r"\bshutdown\b", "shuts the machine down", None),
        pat("reboot", r"\breboot\b", "reboots the machine", None),
        pat(
            "kill-9",
            r"kill\s+-9",
            "force-kills a process without cleanup",
            Some("kill -TERM first"),
        ),
        pat(
            "npm-install",
            r"npm\s+install",
            "modifies dependencies and lockfile",
            Some("npm install --dry-run"),
        ),
        pat(
            "package-add",
            r"(yarn|pnpm|cargo)\s+add",
            "modifies dependencies and lockfile",
            Some("review the dependency before adding"),
        ),
        pat(
            "pip-install",
            r"pip\s+install",
            "modifies the Python environment",
            Some("pip install --dry-run"),
        ),
    ]
});

static SAFE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    let safe = |name, re: &str| (name, Regex::new(&format!("(?i){}", re)).unwrap());
    vec![
        safe("list", r"^\s*ls\b"),
        safe("print-file", r"^\s*cat\b"),
        safe("print", r"^\s*echo\b"),
        safe("cwd", r"^\s*pwd\s*$"),
        safe("search", r"^\s*(rg|grep)\b"),
        safe("find", r"^\s*find\b"),
        safe("git-read", r"^\s*git\s+(status|diff|log|show|branch)\b"),
        safe("cargo-read", r"^\s*cargo\s+(check|build|test|fmt|clippy)\b"),
        safe("npm-read", r"^\s*npm\s+(test|run\s+lint|ls)\b"),
        safe("which", r"^\s*which\b"),
        safe("head-tail", r"^\s*(head|tail)\b"),
        safe("wc", r"^\s*wc\b"),
    ]
});

/// Classify a command string. Destructive table first, then the safe
/// table; first match wins, and unmatched commands are `unknown`.
pub fn classify(command: &str) -> CommandClassification {
    for p in DESTRUCTIVE_PATTERNS.iter() {
        if p.regex.is_match(command) {
            return CommandClassification {
                risk: CommandRisk::Destructive,
                pattern: Some(p.name.to_string()),
                reason: Some(p.reason.to_string()),
                alternative: p.alternative.map(str::to_string),
            };
        }
    }
    for (name, regex) in SAFE_PATTERNS.iter() {
        if regex.is_match(command) {
            return CommandClassification {
                risk: CommandRisk::Safe,
                pattern: Some(name.to_string()),
                reason: None,
                alternative: None,
            };
        }
    }
    CommandClassification {
        risk: CommandRisk::Unknown,
        pattern: None,
        reason: None,
        alternative: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_destructive_patterns_match() {
        let destructive = [
            "rm -rf /tmp/build",
            "rmdir /s old",
            "FORMAT c:",
            "mkfs.ext4 /dev/sda1",
            "dd if=/dev/zero of=/dev/sda",
            "git push --force origin main",
            "git reset --hard HEAD~3",
            "git clean -fdx",
            "DROP TABLE users;",
            "drop database prod",
            "DELETE FROM users WHERE id = 1",
            "chmod 777 /var/www",
            "chown root:root /etc/passwd",
            "shutdown -h now",
            "sudo reboot",
            "kill -9 4242",
        ];
        for cmd in destructive {
            assert_eq!(classify(cmd).risk, CommandRisk::Destructive, "{cmd}");
        }
    }

    #[test]
    fn force_push_suggests_force_with_lease() {
        let c = classify("git push --force origin main");
        assert_eq!(c.alternative.as_deref(), Some("git push --force-with-lease"));
        assert_eq!(c.pattern.as_deref(), Some("git-force-push"));
    }

    #[test]
    fn package_installs_are_destructive_with_dry_run_hint() {
        let c = classify("npm install left-pad");
        assert_eq!(c.risk, CommandRisk::Destructive);
        assert!(c.alternative.unwrap().contains("--dry-run"));
        assert_eq!(classify("pip install requests").risk, CommandRisk::Destructive);
        assert_eq!(classify("yarn add react").risk, CommandRisk::Destructive);
    }

    #[test]
    fn destructive_wins_over_safe_ordering() {
        // `cat` is safe but the piped delete matches the destructive table
        // first.
        let c = classify("cat list.txt && rm -rf target");
        assert_eq!(c.risk, CommandRisk::Destructive);
    }

    #[test]
    fn read_only_commands_are_safe() {
        for cmd in ["ls -la", "git status", "cargo check", "grep -r TODO src"] {
            assert_eq!(classify(cmd).risk, CommandRisk::Safe, "{cmd}");
        }
    }

    #[test]
    fn unmatched_commands_are_unknown_and_need_approval() {
        let c = classify("terraform apply");
        assert_eq!(c.risk, CommandRisk::Unknown);
        assert!(c.needs_approval());
        assert!(c.pattern.is_none());
    }
}
