//! Happy-path write tracing: one journal record per accepted mutation,
//! content-addressed and attributed to the session's intent.

use corridor::core::approval::DenyAll;
use corridor::core::hooks::ToolResult;
use corridor::core::spatial;
use corridor::core::trace::{RelatedKind, VcsSnapshot};
use corridor::core::vcs::StaticProbe;
use corridor::Governor;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn workspace_with_weather_intent() -> (TempDir, Governor) {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join(".corridor")).unwrap();
    std::fs::write(
        tmp.path().join(".corridor/intents.yaml"),
        r#"
active_intents:
  - id: INT-001
    name: Weather API
    status: ACTIVE
    owned_scope:
      - "src/api/weather/**"
    constraints:
      - keep the fetch signature stable
"#,
    )
    .unwrap();
    let governor = Governor::bootstrap(
        tmp.path(),
        Arc::new(DenyAll),
        Arc::new(StaticProbe(VcsSnapshot {
            revision_id: "abc123".into(),
            branch: Some("main".into()),
            dirty: Some(false),
        })),
    )
    .unwrap();
    (tmp, governor)
}

fn write_args(path: &str, content: &str) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("path".into(), Value::String(path.into()));
    args.insert("content".into(), Value::String(content.into()));
    args
}

fn write_tool(workspace: &Path) -> impl FnOnce(&Map<String, Value>) -> ToolResult + '_ {
    move |args| {
        let path = args.get("path").and_then(Value::as_str).unwrap();
        let content = args.get("content").and_then(Value::as_str).unwrap_or("");
        let full = workspace.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
        ToolResult::ok(json!({ "written": path }))
    }
}

fn select(governor: &Governor, session: &str, intent: &str) {
    let mut args = Map::new();
    args.insert("intent_id".into(), Value::String(intent.into()));
    let result = governor.select_intent(session, args);
    assert!(result.success, "{:?}", result.error);
}

#[test]
fn accepted_write_appends_exactly_one_attributed_record() {
    let (tmp, governor) = workspace_with_weather_intent();
    let content = "export const f = 1;\n";

    select(&governor, "s-1", "INT-001");
    governor
        .register_read("src/api/weather/fetch.ts", "s-1")
        .unwrap();
    let result = governor.execute(
        "write_to_file",
        write_args("src/api/weather/fetch.ts", content),
        "s-1",
        write_tool(tmp.path()),
    );
    assert!(result.success, "{:?}", result.error);

    let journal =
        std::fs::read_to_string(tmp.path().join(".corridor/traces.jsonl")).unwrap();
    assert_eq!(journal.lines().count(), 1);

    let records = governor.traces.all();
    let record = &records[0];
    assert_eq!(record.files[0].relative_path, "src/api/weather/fetch.ts");
    assert_eq!(record.vcs.revision_id, "abc123");
    let conversation = &record.files[0].conversations[0];
    assert!(conversation
        .related
        .iter()
        .any(|r| r.kind == RelatedKind::Specification && r.value == "INT-001"));
    assert_eq!(
        conversation.ranges[0].content_hash,
        spatial::hash(content)
    );
    assert!(!record.uuid.is_empty());
    assert!(record.ts.contains('T'));
}

#[test]
fn record_is_retrievable_by_content_hash() {
    let (tmp, governor) = workspace_with_weather_intent();
    let content = "export const cache = new Map();\n";
    select(&governor, "s-1", "INT-001");
    governor
        .register_read("src/api/weather/cache.ts", "s-1")
        .unwrap();
    governor.execute(
        "write_to_file",
        write_args("src/api/weather/cache.ts", content),
        "s-1",
        write_tool(tmp.path()),
    );

    let hits = governor.traces.by_content_hash(&spatial::hash(content));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1, "src/api/weather/cache.ts");
}

#[test]
fn journal_is_append_only_across_operations() {
    let (tmp, governor) = workspace_with_weather_intent();
    select(&governor, "s-1", "INT-001");
    let journal_path = tmp.path().join(".corridor/traces.jsonl");

    let mut snapshots: Vec<Vec<u8>> = Vec::new();
    for (i, name) in ["a.ts", "b.ts", "c.ts"].iter().enumerate() {
        let path = format!("src/api/weather/{}", name);
        governor.register_read(&path, "s-1").unwrap();
        governor.execute(
            "write_to_file",
            write_args(&path, &format!("export const v{} = {};\n", i, i)),
            "s-1",
            write_tool(tmp.path()),
        );
        snapshots.push(std::fs::read(&journal_path).unwrap());
    }

    // The journal after operation N is a byte-prefix of the journal after
    // operation N+1.
    for pair in snapshots.windows(2) {
        assert!(pair[1].starts_with(&pair[0]));
        assert!(pair[1].len() > pair[0].len());
    }
}

#[test]
fn rewrite_of_a_file_classifies_the_mutation() {
    let (tmp, governor) = workspace_with_weather_intent();
    select(&governor, "s-1", "INT-001");
    let path = "src/api/weather/fix.ts";

    governor.register_read(path, "s-1").unwrap();
    governor.execute(
        "write_to_file",
        write_args(path, "function f(){ /* TODO: fix */ return 1; }"),
        "s-1",
        write_tool(tmp.path()),
    );

    governor.register_read(path, "s-1").unwrap();
    governor.execute(
        "write_to_file",
        write_args(path, "function f(){ return 1; }"),
        "s-1",
        write_tool(tmp.path()),
    );

    let records = governor.traces.by_file(path);
    assert_eq!(records.len(), 2);
    // First write had no prior content, so no classification.
    assert!(records[0].files[0].conversations[0].mutation_class.is_none());
    let class = records[1].files[0].conversations[0].mutation_class.unwrap();
    assert_eq!(class.to_string(), "BUG_FIX");
    let confidence = records[1].files[0].conversations[0].ranges[0]
        .confidence
        .unwrap();
    assert!(confidence >= 0.8);
}

#[test]
fn intent_map_is_rewritten_from_the_journal() {
    let (tmp, governor) = workspace_with_weather_intent();
    select(&governor, "s-1", "INT-001");
    governor
        .register_read("src/api/weather/a.ts", "s-1")
        .unwrap();
    governor.execute(
        "write_to_file",
        write_args("src/api/weather/a.ts", "export {};\n"),
        "s-1",
        write_tool(tmp.path()),
    );
    let map = std::fs::read_to_string(tmp.path().join(".corridor/intent_map.md")).unwrap();
    assert!(map.contains("## INT-001"));
    assert!(map.contains("src/api/weather/a.ts"));
}
