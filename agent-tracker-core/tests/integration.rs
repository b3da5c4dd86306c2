//! Integration tests for the agent-tracker ingestion pipeline
//!
//! These tests use fixture files in `tests/fixtures/` to verify the
//! end-to-end flow from JSONL on disk to store snapshots and parsed
//! transcript entries.

use agent_tracker_core::config::TrackerConfig;
use agent_tracker_core::tail::TailOptions;
use agent_tracker_core::transcript::{
    read_transcript, EntryKind, ParsedTranscriptEntry, ToolInput,
};
use agent_tracker_core::{
    Error, ErrorSink, SessionEventWatcher, SessionStatus, SessionStore, TranscriptWatcher,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Copy a fixture into a scratch directory so tests can append to it
fn scratch_copy(dir: &TempDir, name: &str) -> PathBuf {
    let source = fixture_path(name);
    let target = dir.path().join(source.file_name().unwrap());
    fs::copy(&source, &target).unwrap();
    target
}

fn counting_errors() -> (ErrorSink, Arc<Mutex<Vec<String>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink_errors = errors.clone();
    let sink: ErrorSink =
        Arc::new(move |e: &Error| sink_errors.lock().unwrap().push(e.to_string()));
    (sink, errors)
}

fn replay(path: &Path) -> (Arc<SessionStore>, Arc<Mutex<Vec<String>>>, SessionEventWatcher) {
    let store = Arc::new(SessionStore::new(TrackerConfig::default()));
    let (on_error, errors) = counting_errors();
    let watcher = SessionEventWatcher::for_store(
        path,
        TailOptions::events_file().without_watch(),
        store.clone(),
        on_error,
    );
    watcher.start();
    (store, errors, watcher)
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

// ============================================
// Events file -> store
// ============================================

#[test]
fn test_replay_basic_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = scratch_copy(&dir, "events/basic-lifecycle.jsonl");
    let (store, errors, _watcher) = replay(&path);

    assert!(errors.lock().unwrap().is_empty());

    let ids: Vec<String> = store.sessions().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["sess-alpha", "sess-beta", "sess-gamma"]);

    let alpha = store.session("sess-alpha").unwrap();
    assert!(alpha.awaiting_input);
    assert_eq!(alpha.status, SessionStatus::Active);
    assert_eq!(alpha.cwd.as_deref(), Some("/home/dev/projects/api"));
    assert_eq!(alpha.git["branch"], "main");
    assert_eq!(
        alpha.transcript_path,
        Some(PathBuf::from("/home/dev/.claude/projects/api/sess-alpha.jsonl"))
    );

    let beta = store.session("sess-beta").unwrap();
    assert_eq!(
        beta.notification_message.as_deref(),
        Some("Claude needs your permission to use Edit")
    );

    let gamma = store.session("sess-gamma").unwrap();
    assert_eq!(gamma.status, SessionStatus::Ended);
    assert!(gamma.end_time.is_some());

    let counts = store.session_counts();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.active, 2);
    assert_eq!(counts.ended, 1);
    assert_eq!(counts.awaiting_input, 2);

    // The unknown session's activity is counted but not logged or created
    assert_eq!(store.stats().total_events, 9);
    assert_eq!(store.recent_activity().len(), 4);
    assert!(store.session("sess-unknown").is_none());
}

#[test]
fn test_malformed_line_tolerance() {
    let dir = TempDir::new().unwrap();
    let path = scratch_copy(&dir, "events/malformed.jsonl");
    let (store, errors, _watcher) = replay(&path);

    assert_eq!(store.stats().total_events, 2);
    assert_eq!(errors.lock().unwrap().len(), 1);

    let session = store.session("sess-one").unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

#[test]
fn test_appends_after_replay_and_reactivation() {
    let dir = TempDir::new().unwrap();
    let path = scratch_copy(&dir, "events/basic-lifecycle.jsonl");
    let (store, _errors, watcher) = replay(&path);

    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(
        file,
        r#"{{"event_type":"activity","session_id":"sess-gamma","timestamp":"2025-06-01T10:10:00Z","activity_type":"prompt_submit"}}"#
    )
    .unwrap();
    watcher.read_new_data();

    let gamma = store.session("sess-gamma").unwrap();
    assert_eq!(gamma.status, SessionStatus::Active);
    assert!(gamma.end_time.is_none());
    assert_eq!(store.stats().total_events, 10);
}

#[test]
fn test_truncated_events_file_is_reread() {
    let dir = TempDir::new().unwrap();
    let path = scratch_copy(&dir, "events/basic-lifecycle.jsonl");
    let (store, _errors, watcher) = replay(&path);
    assert_eq!(store.stats().total_events, 9);

    fs::write(
        &path,
        "{\"event_type\":\"session_start\",\"session_id\":\"sess-new\",\"timestamp\":\"2025-06-02T08:00:00Z\"}\n",
    )
    .unwrap();
    watcher.read_new_data();

    assert!(store.session("sess-new").is_some());
    assert_eq!(store.stats().total_events, 10);
}

#[test]
fn test_live_watch_picks_up_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.jsonl");
    let store = Arc::new(SessionStore::new(TrackerConfig::default()));
    let (on_error, _errors) = counting_errors();

    let watcher =
        SessionEventWatcher::for_store(&path, TailOptions::events_file(), store.clone(), on_error);
    watcher.start();

    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(
        file,
        r#"{{"event_type":"session_start","session_id":"live","timestamp":"2025-06-01T10:00:00Z"}}"#
    )
    .unwrap();
    file.sync_all().unwrap();

    assert!(wait_for(|| store.session("live").is_some()));
    watcher.stop();
}

// ============================================
// Transcripts
// ============================================

#[test]
fn test_read_transcript_fixture() {
    let entries = read_transcript(&fixture_path("transcripts/bash-session.jsonl")).unwrap();

    let kinds: Vec<EntryKind> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntryKind::FileHistory,
            EntryKind::Meta,
            EntryKind::User,
            EntryKind::Thinking,
            EntryKind::ToolUse,
            EntryKind::ToolResult,
            EntryKind::User,
            EntryKind::System,
            EntryKind::Assistant,
        ]
    );

    assert_eq!(entries[0].file_count, Some(2));
    assert_eq!(entries[0].uuid.as_deref(), Some("snap-1"));

    let tool_use = &entries[4];
    assert_eq!(tool_use.tool_name.as_deref(), Some("Bash"));
    assert_eq!(tool_use.tool_id.as_deref(), Some("toolu_01"));
    assert_eq!(tool_use.content, "Build the project");
    assert!(matches!(tool_use.typed_tool_input(), Some(ToolInput::Bash(_))));

    let result = &entries[5];
    assert_eq!(result.tool_use_id.as_deref(), Some("toolu_01"));
    assert_eq!(result.is_error, Some(true));

    // Merged across the intervening system record
    assert_eq!(
        entries[6].content,
        "$ git status\n\nOn branch main\nnothing to commit"
    );
    assert_eq!(entries[6].uuid.as_deref(), Some("u-4"));

    let compact = &entries[7];
    assert_eq!(compact.subtype.as_deref(), Some("compact_boundary"));
    assert_eq!(
        compact
            .compact_metadata
            .as_ref()
            .and_then(|m| m.get("trigger"))
            .and_then(|t| t.as_str()),
        Some("auto")
    );
}

#[test]
fn test_parsed_entries_serialize_camel_case() {
    let entries = read_transcript(&fixture_path("transcripts/bash-session.jsonl")).unwrap();
    let json = serde_json::to_value(&entries[5]).unwrap();

    assert_eq!(json["type"], "tool_result");
    assert_eq!(json["toolUseId"], "toolu_01");
    assert_eq!(json["isError"], true);
}

#[test]
fn test_transcript_watcher_follows_appends() {
    let dir = TempDir::new().unwrap();
    let path = scratch_copy(&dir, "transcripts/bash-session.jsonl");
    let batches: Arc<Mutex<Vec<Vec<ParsedTranscriptEntry>>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink_batches = batches.clone();
    let (on_error, errors) = counting_errors();

    let watcher = TranscriptWatcher::with_options(
        &path,
        TailOptions::live_transcript(Duration::from_millis(50)).without_watch(),
        Arc::new(move |entries: Vec<ParsedTranscriptEntry>| {
            sink_batches.lock().unwrap().push(entries)
        }),
        on_error,
    );
    watcher.start();
    watcher.read_new_data();
    assert!(batches.lock().unwrap().is_empty());

    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(
        file,
        r#"{{"type":"assistant","uuid":"a-4","timestamp":"2025-06-01T10:02:00.000Z","message":{{"role":"assistant","content":[{{"type":"text","text":"Fixed."}}]}}}}"#
    )
    .unwrap();
    watcher.read_new_data();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].content, "Fixed.");
    assert!(errors.lock().unwrap().is_empty());
}
