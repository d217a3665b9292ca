//! Derived intent-to-file map.
//!
//! A markdown view rewritten from the trace journal, sectioned by intent id
//! with one bullet per (file, mutation class, timestamp) tuple. The journal
//! is the single source of truth; this file is disposable.

use crate::core::error::CorridorError;
use crate::core::time;
use crate::core::trace::TraceStore;
use std::collections::BTreeMap;
use std::path::Path;

/// Rebuild the map file from the journal. The whole file is rewritten.
pub fn rebuild(traces: &TraceStore, map_path: &Path) -> Result<(), CorridorError> {
    let mut sections: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in traces.all() {
        let Some(intent_id) = record.intent_id().map(str::to_string) else {
            continue;
        };
        for file in &record.files {
            let class = file
                .conversations
                .iter()
                .find_map(|c| c.mutation_class)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "UNCLASSIFIED".to_string());
            sections.entry(intent_id.clone()).or_default().push(format!(
                "- `{}` ({}) at {}",
                file.relative_path, class, record.ts
            ));
        }
    }

    let mut md = String::from("# Intent Map\n\n");
    md.push_str(&format!("Rebuilt: {}\n\n", time::now_rfc3339()));
    if sections.is_empty() {
        md.push_str("No traced mutations yet.\n");
    }
    for (intent_id, bullets) in sections {
        md.push_str(&format!("## {}\n\n", intent_id));
        for bullet in bullets {
            md.push_str(&bullet);
            md.push('\n');
        }
        md.push('\n');
    }
    std::fs::write(map_path, md).map_err(CorridorError::IoError)
}
