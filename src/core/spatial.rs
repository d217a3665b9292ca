//! Content-addressed spatial hashing.
//!
//! A code region is identified by the SHA-256 of its normalized text, not by
//! the file or line range it happens to occupy. `find_by_hash` walks a tree
//! with a sliding window to locate a fingerprint wherever it has moved.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffixes considered source code during tree search.
const SOURCE_SUFFIXES: &[&str] = &[
    ".rs", ".ts", ".tsx", ".js", ".jsx", ".py", ".go", ".java", ".c", ".h", ".cpp", ".hpp",
    ".cs", ".rb", ".php", ".swift", ".kt",
];

/// Window sizes tried by `find_by_hash`, in lines.
const WINDOW_SIZES: [usize; 10] = [5, 10, 15, 20, 25, 30, 35, 40, 45, 50];

/// A located occurrence of a content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialMatch {
    pub path: PathBuf,
    /// 1-indexed, inclusive
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

/// Normalize text for hashing: split on LF, strip trailing horizontal
/// whitespace per line, rejoin with LF, trim the outer result.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    text.split('\n')
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// SHA-256 of the normalized text, hex-encoded.
pub fn hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash only the inclusive 1-indexed line range of a file.
pub fn hash_block(path: &Path, start: usize, end: usize) -> std::io::Result<String> {
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.split('\n').collect();
    if start == 0 || start > end || start > lines.len() {
        return Ok(hash(""));
    }
    let end = end.min(lines.len());
    Ok(hash(&lines[start - 1..end].join("\n")))
}

/// Search directory trees for a content fingerprint by sliding window.
///
/// Skips dot-directories and `node_modules`, and files without a recognized
/// source suffix. Deliberately O(files × 50 × lines): an auditor query, not
/// a hot path.
pub fn find_by_hash(target: &str, search_roots: &[PathBuf]) -> Vec<SpatialMatch> {
    let mut matches = Vec::new();
    for root in search_roots {
        walk(root, target, &mut matches);
    }
    matches
}

fn walk(dir: &Path, target: &str, matches: &mut Vec<SpatialMatch>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir() {
            if name.starts_with('.') || name == "node_modules" {
                continue;
            }
            walk(&path, target, matches);
        } else if is_source_file(&name) {
            scan_file(&path, target, matches);
        }
    }
}

fn is_source_file(name: &str) -> bool {
    SOURCE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn scan_file(path: &Path, target: &str, matches: &mut Vec<SpatialMatch>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.split('\n').collect();
    for window in WINDOW_SIZES {
        if window > lines.len() {
            break;
        }
        for start in 0..=(lines.len() - window) {
            let slice = lines[start..start + window].join("\n");
            if hash(&slice) == target {
                matches.push(SpatialMatch {
                    path: path.to_path_buf(),
                    start_line: start + 1,
                    end_line: start + window,
                    content: slice,
                });
                // One hit per window size is enough to place the region.
                break;
            }
        }
    }
}
