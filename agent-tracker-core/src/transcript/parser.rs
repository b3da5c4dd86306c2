//! Classification of one raw transcript record into a display entry
//!
//! [`parse_entry`] is pure: it looks at the current record and at most
//! [`LOOKAHEAD_WINDOW`] records that follow it, and returns zero or one
//! entry plus how many of the following records it merged in.
//!
//! # User records
//!
//! 1. A `tool_result` block wins over everything else.
//! 2. Otherwise the text is flattened; blank text yields nothing.
//! 3. A `<bash-input>` record is merged with the first `<bash-stdout>` /
//!    `<bash-stderr>` user record inside the window:
//!    `"$ <cmd>\n\n<stdout>\n\n[stderr]\n<stderr>"`. Without a match the bare
//!    `"$ <cmd>"` is emitted and a later output renders on its own.
//! 4. Output with no input in view renders standalone.
//! 5. `isMeta` records become [`EntryKind::Meta`].
//!
//! # Assistant records
//!
//! One entry per record, picked by the first kind present in priority order
//! `thinking`, `text`, `tool_use`.

use super::entry::{EntryKind, ParsedTranscriptEntry};
use super::raw::{join_text_blocks, ContentBlock, RawContent, RawTranscriptEntry};
use super::tool_input::ToolInput;

/// How many following records are inspected for a bash output.
pub const LOOKAHEAD_WINDOW: usize = 3;

/// Result of [`parse_entry`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub parsed: Option<ParsedTranscriptEntry>,
    /// Number of following records merged into `parsed`; the caller skips
    /// that many on its next iterations
    pub consumed: usize,
}

impl ParseOutcome {
    fn single(parsed: Option<ParsedTranscriptEntry>) -> Self {
        Self {
            parsed,
            consumed: 0,
        }
    }

    fn skip() -> Self {
        Self::single(None)
    }
}

/// Parse `current`, with `upcoming` holding the records that follow it.
///
/// Only the first [`LOOKAHEAD_WINDOW`] records of `upcoming` are considered.
pub fn parse_entry(current: &RawTranscriptEntry, upcoming: &[RawTranscriptEntry]) -> ParseOutcome {
    let window = &upcoming[..upcoming.len().min(LOOKAHEAD_WINDOW)];

    match current.entry_type.as_deref() {
        Some("user") => parse_user(current, window),
        Some("assistant") => ParseOutcome::single(parse_assistant(current)),
        Some("system") => ParseOutcome::single(Some(parse_system(current))),
        Some("file-history-snapshot") => ParseOutcome::single(Some(parse_file_history(current))),
        _ => ParseOutcome::skip(),
    }
}

fn parse_user(current: &RawTranscriptEntry, window: &[RawTranscriptEntry]) -> ParseOutcome {
    if let Some(result) = tool_result_entry(current) {
        return ParseOutcome::single(Some(result));
    }

    let text = current.flattened_text();
    if text.trim().is_empty() {
        return ParseOutcome::skip();
    }

    if let Some(command) = bash_input(&text) {
        for (idx, next) in window.iter().enumerate() {
            if !next.is_type("user") {
                continue;
            }
            if let Some(output) = bash_output(&next.flattened_text()) {
                let entry = ParsedTranscriptEntry::from_raw(
                    current,
                    EntryKind::User,
                    merge_bash(command, &output),
                );
                return ParseOutcome {
                    parsed: Some(entry),
                    consumed: idx + 1,
                };
            }
        }
        return ParseOutcome::single(Some(ParsedTranscriptEntry::from_raw(
            current,
            EntryKind::User,
            format!("$ {}", command),
        )));
    }

    if let Some(output) = bash_output(&text) {
        let content = output.standalone();
        if content.trim().is_empty() {
            return ParseOutcome::skip();
        }
        return ParseOutcome::single(Some(ParsedTranscriptEntry::from_raw(
            current,
            EntryKind::User,
            content,
        )));
    }

    let kind = if current.is_meta() {
        EntryKind::Meta
    } else {
        EntryKind::User
    };
    ParseOutcome::single(Some(ParsedTranscriptEntry::from_raw(current, kind, text)))
}

fn tool_result_entry(current: &RawTranscriptEntry) -> Option<ParsedTranscriptEntry> {
    current.blocks().iter().find_map(|block| match block {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let mut entry = ParsedTranscriptEntry::from_raw(
                current,
                EntryKind::ToolResult,
                flatten_result_content(content),
            );
            entry.tool_use_id = Some(tool_use_id.clone());
            entry.is_error = Some(*is_error);
            Some(entry)
        }
        _ => None,
    })
}

/// Tool result content is either a string or a list of text blocks.
fn flatten_result_content(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(|t| t.as_str()),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_assistant(current: &RawTranscriptEntry) -> Option<ParsedTranscriptEntry> {
    let blocks = match current.message_content()? {
        RawContent::Text(text) => {
            if text.trim().is_empty() {
                return None;
            }
            return Some(ParsedTranscriptEntry::from_raw(
                current,
                EntryKind::Assistant,
                text.clone(),
            ));
        }
        RawContent::Blocks(blocks) => blocks,
    };

    let thinking = blocks.iter().find_map(|b| match b {
        ContentBlock::Thinking { thinking } => Some(thinking),
        _ => None,
    });
    if let Some(thinking) = thinking {
        return Some(ParsedTranscriptEntry::from_raw(
            current,
            EntryKind::Thinking,
            thinking.clone(),
        ));
    }

    if blocks.iter().any(|b| matches!(b, ContentBlock::Text { .. })) {
        return Some(ParsedTranscriptEntry::from_raw(
            current,
            EntryKind::Assistant,
            join_text_blocks(blocks),
        ));
    }

    blocks.iter().find_map(|b| match b {
        ContentBlock::ToolUse { id, name, input } => {
            let summary = ToolInput::from_tool(name, input).summary();
            let mut entry =
                ParsedTranscriptEntry::from_raw(current, EntryKind::ToolUse, summary);
            entry.tool_name = Some(name.clone());
            entry.tool_input = Some(input.clone());
            entry.tool_id = Some(id.clone());
            Some(entry)
        }
        _ => None,
    })
}

fn parse_system(current: &RawTranscriptEntry) -> ParsedTranscriptEntry {
    let content = match &current.content {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let mut entry = ParsedTranscriptEntry::from_raw(current, EntryKind::System, content);
    entry.subtype = current.subtype.clone();
    entry.compact_metadata = current.compact_metadata.clone();
    entry
}

fn parse_file_history(current: &RawTranscriptEntry) -> ParsedTranscriptEntry {
    let file_count = current
        .snapshot
        .as_ref()
        .and_then(|s| s.tracked_file_backups.as_ref())
        .map(|files| files.len())
        .unwrap_or(0);
    let mut entry = ParsedTranscriptEntry::from_raw(
        current,
        EntryKind::FileHistory,
        format!("{} tracked file(s)", file_count),
    );
    entry.file_count = Some(file_count);
    entry
}

// ============================================
// Bash markers
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct BashOutput {
    stdout: String,
    stderr: String,
}

impl BashOutput {
    fn standalone(&self) -> String {
        [self.stdout.as_str(), self.stderr.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Inner text of the first `<tag>...</tag>` in `text`.
fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(&text[start..end])
}

fn bash_input(text: &str) -> Option<&str> {
    extract_tag(text, "bash-input").map(str::trim)
}

fn bash_output(text: &str) -> Option<BashOutput> {
    let stdout = extract_tag(text, "bash-stdout");
    let stderr = extract_tag(text, "bash-stderr");
    if stdout.is_none() && stderr.is_none() {
        return None;
    }
    Some(BashOutput {
        stdout: stdout.unwrap_or("").trim().to_string(),
        stderr: stderr.unwrap_or("").trim().to_string(),
    })
}

fn merge_bash(command: &str, output: &BashOutput) -> String {
    let mut merged = format!("$ {}", command);
    if !output.stdout.is_empty() {
        merged.push_str("\n\n");
        merged.push_str(&output.stdout);
    }
    if !output.stderr.is_empty() {
        merged.push_str("\n\n[stderr]\n");
        merged.push_str(&output.stderr);
    }
    merged
}
