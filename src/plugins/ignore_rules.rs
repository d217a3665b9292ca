//! Exclusion / allow-destructive / require-approval rules.
//!
//! Plaintext rule file, one rule per line:
//!
//! ```text
//! # comment
//! node_modules/**
//! *.log exclude
//! INT-001:scripts/** allow_destructive
//! INT-002:src/config/** require_approval
//! ```
//!
//! Rules without an intent prefix are global. Intent-specific rules
//! override global rules carrying the same pattern. Matching uses
//! ignore-glob semantics: a pattern also matches at any depth, the way a
//! canonical ignore-file implementation treats unanchored patterns.

use crate::core::glob;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Exclude,
    AllowDestructive,
    RequireApproval,
}

impl RuleKind {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "exclude" => Some(Self::Exclude),
            "allow_destructive" => Some(Self::AllowDestructive),
            "require_approval" => Some(Self::RequireApproval),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub intent_id: Option<String>,
    pub pattern: String,
    pub kind: RuleKind,
}

/// Defaults applied when the rules file is absent.
const DEFAULT_EXCLUDES: &[&str] = &["node_modules/**", ".git/**", "dist/**", "*.log"];

/// Parsed rule table.
pub struct IgnoreIndex {
    rules: Vec<IgnoreRule>,
}

impl IgnoreIndex {
    /// Load rules from `path`, falling back to the default exclusions when
    /// the file is missing. Unparseable lines are skipped.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::defaults();
        };
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rule) = Self::parse_line(line) {
                rules.push(rule);
            }
        }
        Self { rules }
    }

    pub fn defaults() -> Self {
        Self {
            rules: DEFAULT_EXCLUDES
                .iter()
                .map(|p| IgnoreRule {
                    intent_id: None,
                    pattern: p.to_string(),
                    kind: RuleKind::Exclude,
                })
                .collect(),
        }
    }

    /// `[intent_id:]pattern [kind]`, kind defaulting to `exclude`.
    fn parse_line(line: &str) -> Option<IgnoreRule> {
        let mut words = line.split_whitespace();
        let target = words.next()?;
        let kind = match words.next() {
            Some(word) => RuleKind::parse(word)?,
            None => RuleKind::Exclude,
        };
        // An intent prefix is an id before the first ':'; ids carry no
        // glob metacharacters or separators.
        let (intent_id, pattern) = match target.split_once(':') {
            Some((id, rest))
                if !id.is_empty() && !id.contains('/') && !id.contains('*') && !id.contains('?') =>
            {
                (Some(id.to_string()), rest.to_string())
            }
            _ => (None, target.to_string()),
        };
        if pattern.is_empty() {
            return None;
        }
        Some(IgnoreRule {
            intent_id,
            pattern,
            kind,
        })
    }

    /// Ignore-glob match: unanchored patterns also match at any depth.
    fn pattern_matches(pattern: &str, target: &str) -> bool {
        let target = target.replace('\\', "/");
        glob::glob_match(pattern, &target)
            || glob::glob_match(&format!("**/{}", pattern), &target)
    }

    /// Rules of `kind` matching `target`, with intent-specific rules
    /// shadowing global ones that carry the same pattern.
    fn effective<'a>(
        &'a self,
        target: &str,
        intent: Option<&str>,
    ) -> impl Iterator<Item = &'a IgnoreRule> + 'a {
        let target = target.to_string();
        let intent = intent.map(str::to_string);
        self.rules.iter().filter(move |rule| {
            let applies = match (&rule.intent_id, &intent) {
                (None, _) => {
                    // Shadowed if the intent declares the same pattern.
                    !self.rules.iter().any(|other| {
                        other.intent_id.is_some()
                            && other.intent_id.as_deref() == intent.as_deref()
                            && other.pattern == rule.pattern
                    })
                }
                (Some(rule_intent), Some(current)) => rule_intent == current,
                (Some(_), None) => false,
            };
            applies && Self::pattern_matches(&rule.pattern, &target)
        })
    }

    pub fn is_excluded(&self, target: &str, intent: Option<&str>) -> bool {
        self.effective(target, intent)
            .any(|r| r.kind == RuleKind::Exclude)
    }

    /// Whether any allow-destructive rule is in force for this intent
    /// (intent-specific or global).
    pub fn allows_destructive(&self, intent: Option<&str>) -> bool {
        self.rules.iter().any(|rule| {
            rule.kind == RuleKind::AllowDestructive
                && match (&rule.intent_id, intent) {
                    (None, _) => true,
                    (Some(rule_intent), Some(current)) => rule_intent == current,
                    (Some(_), None) => false,
                }
        })
    }

    pub fn requires_approval(&self, target: &str, intent: Option<&str>) -> bool {
        self.effective(target, intent)
            .any(|r| r.kind == RuleKind::RequireApproval)
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }
}
