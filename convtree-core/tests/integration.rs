//! Integration tests for the convtree pipeline
//!
//! These tests use fixture files in `tests/fixtures/` to verify the
//! end-to-end flow from raw JSONL lines to snapshots.

use convtree_core::classify::{ContentType, DisplayStrategy};
use convtree_core::ingest::{consolidate, parse_lines, parse_reader};
use convtree_core::stream::{process_batch, SessionProcessor};
use convtree_core::tree::{NodeData, ToolStatus};
use convtree_core::{
    Classifier, ParseErrorKind, StreamDriver, StreamEnd, StreamEvent, TreeOptions,
};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_lines(name: &str) -> Vec<String> {
    let text = std::fs::read_to_string(fixture_path(name)).unwrap();
    text.lines().map(String::from).collect()
}

const FIXTURES: [&str; 3] = [
    "claude-code-session.jsonl",
    "stream-json.jsonl",
    "malformed.jsonl",
];

// ============================================
// Claude Code transcript
// ============================================

#[test]
fn test_claude_code_session_tree() {
    let snapshot = process_batch(fixture_lines("claude-code-session.jsonl"));
    let tree = &snapshot.tree;

    assert!(snapshot.errors.is_empty());
    assert!(snapshot.link_mismatches.is_empty());
    assert_eq!(snapshot.message_count, 12);
    assert_eq!(tree.root.id, "session:sess-42");

    let top: Vec<&str> = tree.root.children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        top,
        vec![
            "msg:summary#0",
            "msg:u-1",
            "msg:a-1",
            "msg:u-2",
            "msg:a-3",
            "msg:u-3",
            "msg:a-4",
            "msg:u-4",
            "msg:a-5",
            "msg:u-5",
            "msg:a-6",
        ]
    );

    // Streamed chunks a-1 and a-2 share msg_01 and became one message
    let a1: Vec<&str> = tree
        .find("msg:a-1")
        .unwrap()
        .children
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(a1, vec!["msg:a-1/text:0", "tool:toolu_01"]);
    assert!(tree.find("msg:a-2").is_none());
    assert_eq!(
        tree.find("result:toolu_01").unwrap().parent_id.as_deref(),
        Some("tool:toolu_01")
    );

    assert_eq!(
        tree.label("msg:a-5/text:0").as_deref(),
        Some("(thinking) The issue tracker may describe the failure.")
    );
}

#[test]
fn test_claude_code_session_classifications() {
    let snapshot = process_batch(fixture_lines("claude-code-session.jsonl"));
    let tree = &snapshot.tree;

    let read = tree.classification("result:toolu_01").unwrap();
    assert_eq!(read.content_type, ContentType::FileContent);
    assert_eq!(read.display_strategy, DisplayStrategy::InlineWithSyntax);
    assert_eq!(read.meta("language"), Some("rust"));
    assert_eq!(read.meta("file_path"), Some("/home/dev/proj/src/parser.rs"));
    assert_eq!(read.meta("line_count"), Some("3"));

    let bash = tree.classification("result:toolu_02").unwrap();
    assert_eq!(bash.content_type, ContentType::ErrorContent);
    assert_eq!(bash.meta("error_type"), Some("command_not_found"));
    assert!(matches!(
        &tree.find("tool:toolu_02").unwrap().data,
        NodeData::ToolCall(t) if t.status == ToolStatus::Failed
    ));

    let grep = tree.classification("result:toolu_03").unwrap();
    assert_eq!(grep.content_type, ContentType::FileList);

    let mcp = tree.classification("result:toolu_04").unwrap();
    assert_eq!(mcp.content_type, ContentType::JsonApiResponse);
    assert_eq!(mcp.meta("api_server"), Some("github"));
    assert_eq!(mcp.meta("api_tool"), Some("get_issue"));

    for id in ["tool:toolu_01", "tool:toolu_02", "tool:toolu_03", "tool:toolu_04"] {
        assert_eq!(
            tree.classification(id).map(|c| c.content_type),
            Some(ContentType::ToolInput),
            "{id}"
        );
    }
}

#[test]
fn test_claude_code_session_metadata() {
    let snapshot = process_batch(fixture_lines("claude-code-session.jsonl"));
    let meta = &snapshot.metadata;

    assert_eq!(meta.session_id.as_deref(), Some("sess-42"));
    assert_eq!(meta.cwd.as_deref(), Some("/home/dev/proj"));
    assert_eq!(meta.git_branch.as_deref(), Some("main"));
    assert_eq!(meta.version.as_deref(), Some("2.0.14"));
    assert_eq!(meta.model.as_deref(), Some("claude-sonnet-4-5"));
    assert_eq!(meta.summary.as_deref(), Some("Fix failing parser test"));
    assert_eq!(meta.message_count, 12);
    assert_eq!(meta.span(), Some(chrono::Duration::seconds(30)));
}

#[test]
fn test_opaque_records_on_request() {
    let parsed = parse_lines(fixture_lines("claude-code-session.jsonl"));
    let messages = consolidate(parsed.messages);
    let classifier = Classifier::default();
    let options = TreeOptions {
        include_opaque: true,
        ..Default::default()
    };
    let tree = convtree_core::tree::build_tree(
        &messages,
        &convtree_core::SessionInfo::new("sess-42"),
        &classifier,
        &options,
    );

    let last = tree.root.children.last().unwrap();
    assert_eq!(last.id, "msg:file-history-snapshot#0");
    assert_eq!(tree.root.children.len(), 12);
}

// ============================================
// stream-json output
// ============================================

#[test]
fn test_stream_json_session() {
    let snapshot = process_batch(fixture_lines("stream-json.jsonl"));
    let tree = &snapshot.tree;

    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.message_count, 5);
    assert_eq!(tree.root.id, "session:0f3c");

    let top: Vec<&str> = tree.root.children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        top,
        vec![
            "msg:system#0",
            "msg:msg_a",
            "msg:user#0",
            "msg:msg_b",
            "msg:result#0",
        ]
    );

    let web = tree.classification("result:toolu_w").unwrap();
    assert_eq!(web.content_type, ContentType::WebContent);
    assert_eq!(web.display_strategy, DisplayStrategy::InlineTextOnly);
    assert_eq!(web.confidence, 1.0);

    assert_eq!(
        tree.label("msg:result#0/text:0").as_deref(),
        Some("The page is a placeholder.")
    );

    let meta = &snapshot.metadata;
    assert_eq!(meta.cwd.as_deref(), Some("/tmp/work"));
    assert_eq!(meta.total_cost_usd, Some(0.0042));
    assert_eq!(meta.duration_ms, Some(3100));
    assert_eq!(meta.num_turns, Some(2));
}

// ============================================
// Error isolation
// ============================================

#[test]
fn test_malformed_lines_are_isolated() {
    let snapshot = process_batch(fixture_lines("malformed.jsonl"));

    let errors: Vec<(usize, ParseErrorKind)> =
        snapshot.errors.iter().map(|e| (e.line, e.kind)).collect();
    assert_eq!(
        errors,
        vec![
            (2, ParseErrorKind::Decode),
            (3, ParseErrorKind::UnrecognizedType),
            (5, ParseErrorKind::UnrecognizedType),
            (6, ParseErrorKind::Decode),
        ]
    );
    assert_eq!(snapshot.message_count, 2);
    assert_eq!(snapshot.tree.root.id, "session:bad-1");
    assert!(snapshot.tree.find("msg:a2").is_some());
}

#[test]
fn test_parse_reader_on_fixture() {
    let file = std::fs::File::open(fixture_path("malformed.jsonl")).unwrap();
    let result = parse_reader(std::io::BufReader::new(file)).unwrap();
    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.error_count(), 4);
}

// ============================================
// Cross-cutting properties
// ============================================

#[test]
fn test_incremental_equals_batch() {
    for name in FIXTURES {
        let lines = fixture_lines(name);
        let batch = process_batch(&lines);

        let mut processor = SessionProcessor::default();
        for line in &lines {
            processor.ingest_line(line);
            processor.refresh();
        }
        let incremental = processor.refresh();

        assert_eq!(batch.tree, incremental.tree, "{name}");
        assert_eq!(batch.errors, incremental.errors, "{name}");
        assert_eq!(batch.metadata, incremental.metadata, "{name}");
    }
}

#[test]
fn test_rebuild_is_deterministic() {
    for name in FIXTURES {
        let lines = fixture_lines(name);
        let first = serde_json::to_string(&process_batch(&lines).tree).unwrap();
        let second = serde_json::to_string(&process_batch(&lines).tree).unwrap();
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn test_node_ids_are_unique() {
    for name in FIXTURES {
        let tree = process_batch(fixture_lines(name)).tree;
        let ids = tree.ids();
        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len(), "{name}");
    }
}

#[test]
fn test_every_result_is_rendered_once() {
    for name in FIXTURES {
        let lines = fixture_lines(name);
        let parsed = parse_lines(&lines);
        let result_ids: Vec<String> = parsed
            .messages
            .iter()
            .flat_map(|m| m.tool_results())
            .map(|r| format!("result:{}", r.tool_use_id))
            .collect();

        let tree = process_batch(&lines).tree;
        for id in &result_ids {
            assert!(tree.find(id).is_some(), "{name}: missing {id}");
        }

        let mut result_nodes = 0;
        tree.walk(|n, _| {
            if matches!(n.data, NodeData::Result(_)) {
                result_nodes += 1;
            }
        });
        assert_eq!(result_nodes, result_ids.len(), "{name}");
    }
}

#[test]
fn test_cached_classifications_match_fresh() {
    let lines = fixture_lines("claude-code-session.jsonl");
    let mut processor = SessionProcessor::default();
    processor.ingest_lines(&lines);
    let warm = processor.refresh();
    let hot = processor.refresh();
    processor.clear_cache();
    let cold = processor.refresh();

    assert_eq!(warm.tree.classifications, hot.tree.classifications);
    assert_eq!(hot.tree.classifications, cold.tree.classifications);
}

#[test]
fn test_expansion_survives_appended_lines() {
    let lines = fixture_lines("claude-code-session.jsonl");
    let mut processor = SessionProcessor::default();
    processor.ingest_lines(&lines[..6]);
    let mut before = processor.refresh().tree;
    assert!(before.set_expanded("msg:a-1", true));
    let state = before.expansion_state();

    processor.ingest_lines(&lines[6..]);
    let mut after = processor.refresh().tree;
    after.apply_expansion(&state);

    assert!(after.find("msg:a-1").unwrap().expanded);
    assert!(after.expanded_ids().contains("msg:a-1"));
    assert!(!after.find("msg:a-6").unwrap().expanded);
}

#[test]
fn test_empty_input() {
    let snapshot = process_batch(Vec::<String>::new());
    assert_eq!(snapshot.tree.node_count(), 1);
    assert!(snapshot.errors.is_empty());
    assert!(snapshot.metadata.session_id.is_none());
}

// ============================================
// Stream driver
// ============================================

#[tokio::test]
async fn test_driver_final_snapshot_matches_batch() {
    convtree_core::logging::init_test();
    let lines = fixture_lines("claude-code-session.jsonl");
    let batch = process_batch(&lines);

    let (event_tx, event_rx) = mpsc::channel(64);
    let (snap_tx, mut snap_rx) = mpsc::channel(64);
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let driver = tokio::spawn(
        StreamDriver::new(SessionProcessor::default(), 4).run(event_rx, snap_tx, cancel_rx),
    );
    for line in lines {
        event_tx.send(StreamEvent::Line(line)).await.unwrap();
    }
    event_tx.send(StreamEvent::Complete).await.unwrap();

    let outcome = driver.await.unwrap();
    assert_eq!(outcome.end, StreamEnd::Completed);

    let mut last = None;
    while let Ok(snapshot) = snap_rx.try_recv() {
        last = Some(snapshot);
    }
    let last = last.unwrap();
    assert!(last.complete);
    assert_eq!(last.tree, batch.tree);
    // 13 lines at refresh_every = 4, plus the final snapshot
    assert_eq!(outcome.snapshots_published, 4);
}
