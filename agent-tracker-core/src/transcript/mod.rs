//! Session transcript parsing
//!
//! Transcripts are append-only JSONL written by the agent, one raw record per
//! line. This module turns them into [`ParsedTranscriptEntry`] values for
//! display. There are two entry points:
//!
//! | Caller | Lookahead | Bash merges |
//! |--------|-----------|-------------|
//! | [`read_transcript`] (full load) | real, [`LOOKAHEAD_WINDOW`] records | reliable |
//! | [`TranscriptWatcher`](crate::watcher::TranscriptWatcher) (live tail) | none | never mid-tail |
//!
//! A command whose output lands in a later live batch shows as a bare
//! `$ cmd` followed by a standalone output entry until the next full load.

mod entry;
mod parser;
mod raw;
mod tool_input;

pub use entry::{EntryKind, ParsedTranscriptEntry};
pub use parser::{parse_entry, ParseOutcome, LOOKAHEAD_WINDOW};
pub use raw::{ContentBlock, RawContent, RawMessage, RawSnapshot, RawTranscriptEntry};
pub use tool_input::{
    BashInput, EditInput, GlobInput, GrepInput, ReadInput, TaskInput, TodoItem, TodoWriteInput,
    ToolInput, WebFetchInput, WriteInput,
};

use crate::error::{Error, Result};
use std::path::Path;

/// Decode one transcript line.
pub fn decode_line(
    source_name: &str,
    line_number: usize,
    line: &str,
) -> Result<RawTranscriptEntry> {
    serde_json::from_str(line).map_err(|e| Error::Parse {
        source_name: source_name.to_string(),
        line: line_number,
        message: e.to_string(),
    })
}

/// Parse a buffered sequence of raw records with full lookahead.
///
/// Records merged into an earlier entry are skipped.
pub fn parse_entries(records: &[RawTranscriptEntry]) -> Vec<ParsedTranscriptEntry> {
    let mut parsed = Vec::new();
    let mut skip = 0usize;

    for (idx, record) in records.iter().enumerate() {
        if skip > 0 {
            skip -= 1;
            continue;
        }
        let end = (idx + 1 + LOOKAHEAD_WINDOW).min(records.len());
        let outcome = parse_entry(record, &records[idx + 1..end]);
        skip = outcome.consumed;
        parsed.extend(outcome.parsed);
    }

    parsed
}

/// Decode and parse lines, skipping (and logging) malformed ones.
pub fn parse_lines<'a>(
    source_name: &str,
    lines: impl IntoIterator<Item = &'a str>,
) -> Vec<ParsedTranscriptEntry> {
    let mut records = Vec::new();
    for (idx, line) in lines.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match decode_line(source_name, idx + 1, line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(error = %e, "Skipping malformed transcript line"),
        }
    }
    parse_entries(&records)
}

/// Load a whole transcript file.
///
/// IO failures are returned; malformed lines are skipped.
pub fn read_transcript(path: &Path) -> Result<Vec<ParsedTranscriptEntry>> {
    let bytes = std::fs::read(path).map_err(|e| Error::file(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let source_name = path.display().to_string();

    let entries = parse_lines(&source_name, text.lines());
    tracing::debug!(
        path = %path.display(),
        entries = entries.len(),
        "Loaded transcript"
    );
    Ok(entries)
}
