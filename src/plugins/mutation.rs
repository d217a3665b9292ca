//! Mutation classification over two versions of a blob.
//!
//! Primary path: tokenize both versions to a language-agnostic shape of
//! token kinds (identifiers, literals, and comments erased) and compare.
//! A removed TODO/FIXME marker is checked first so a comment-only fix still
//! classifies as a bug fix. Fallback path: ordered textual heuristics.
//!
//! Confidence is advisory; callers must not branch on exact values.

use crate::core::trace::MutationClass;
use serde::Serialize;

/// Classification outcome with advisory confidence in `[0, 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub class: MutationClass,
    pub confidence: f32,
    pub changes: Vec<String>,
}

const TODO_MARKERS: [&str; 2] = ["TODO", "FIXME"];

/// Classify the change from `original` to `new`.
pub fn classify(original: &str, new: &str) -> Classification {
    match structural(original, new) {
        Some(c) => c,
        None => textual(original, new),
    }
}

/// Token-shape comparison. Returns `None` when either side produces no
/// shape (empty blob), deferring to the textual fallback.
fn structural(original: &str, new: &str) -> Option<Classification> {
    let before = token_shape(original);
    let after = token_shape(new);
    if before.is_empty() || after.is_empty() {
        return None;
    }
    if todo_removed(original, new) {
        return Some(Classification {
            class: MutationClass::BugFix,
            confidence: 0.9,
            changes: vec!["unresolved marker removed".into()],
        });
    }
    if before == after {
        Some(Classification {
            class: MutationClass::AstRefactor,
            confidence: 0.95,
            changes: Vec::new(),
        })
    } else {
        Some(Classification {
            class: MutationClass::IntentEvolution,
            confidence: 0.85,
            changes: vec![format!(
                "structure changed: {} -> {} tokens",
                before.len(),
                after.len()
            )],
        })
    }
}

/// Ordered textual heuristics, applied when no shape is available.
fn textual(original: &str, new: &str) -> Classification {
    if annotation_lines(original) != annotation_lines(new) {
        return Classification {
            class: MutationClass::DocsUpdate,
            confidence: 0.9,
            changes: vec!["documentation annotations changed".into()],
        };
    }
    if todo_removed(original, new) {
        return Classification {
            class: MutationClass::BugFix,
            confidence: 0.8,
            changes: vec!["unresolved marker removed".into()],
        };
    }
    let line_delta = (original.lines().count() as i64 - new.lines().count() as i64).abs();
    let char_delta = (original.len() as i64 - new.len() as i64).abs();
    if line_delta > 20 || char_delta > 500 {
        return Classification {
            class: MutationClass::IntentEvolution,
            confidence: 0.85,
            changes: vec![format!("{} lines, {} chars changed", line_delta, char_delta)],
        };
    }
    Classification {
        class: MutationClass::AstRefactor,
        confidence: 0.65,
        changes: vec![format!("{} lines, {} chars changed", line_delta, char_delta)],
    }
}

fn todo_removed(original: &str, new: &str) -> bool {
    TODO_MARKERS
        .iter()
        .any(|m| original.contains(m) && !new.contains(m))
}

fn annotation_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| {
            let l = l.trim_start();
            ["@param", "@returns", "@return", "@throws"]
                .iter()
                .any(|marker| l.contains(marker))
        })
        .map(|l| l.trim().to_string())
        .collect()
}

/// Language-agnostic token kinds. Identifier spellings, literal values,
/// and comments do not participate in the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Number,
    Str,
    Punct(char),
}

fn token_shape(text: &str) -> Vec<TokenKind> {
    let mut shape = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        // Line comments: // and #
        if c == '/' && chars.get(i + 1) == Some(&'/') || c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                i += 1;
            }
            i = (i + 2).min(chars.len());
        } else if c == '"' || c == '\'' || c == '`' {
            let quote = c;
            i += 1;
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            shape.push(TokenKind::Str);
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            shape.push(TokenKind::Number);
        } else if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            shape.push(TokenKind::Word);
        } else if c.is_whitespace() {
            i += 1;
        } else {
            shape.push(TokenKind::Punct(c));
            i += 1;
        }
    }
    shape
}
