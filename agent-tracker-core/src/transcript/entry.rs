//! Normalized transcript entries handed to the display layer

use super::raw::RawTranscriptEntry;
use super::tool_input::ToolInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display kind of a parsed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "tool_use")]
    ToolUse,
    #[serde(rename = "tool_result")]
    ToolResult,
    #[serde(rename = "thinking")]
    Thinking,
    #[serde(rename = "system")]
    System,
    #[serde(rename = "file-history")]
    FileHistory,
    #[serde(rename = "meta")]
    Meta,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::User => "user",
            EntryKind::Assistant => "assistant",
            EntryKind::ToolUse => "tool_use",
            EntryKind::ToolResult => "tool_result",
            EntryKind::Thinking => "thinking",
            EntryKind::System => "system",
            EntryKind::FileHistory => "file-history",
            EntryKind::Meta => "meta",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One display entry derived from a raw transcript record.
///
/// Type-specific fields are `None` for kinds they do not apply to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTranscriptEntry {
    pub uuid: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_sidechain: bool,
}

impl ParsedTranscriptEntry {
    /// Entry of `kind` carrying identity and time from `raw`.
    pub(crate) fn from_raw(raw: &RawTranscriptEntry, kind: EntryKind, content: String) -> Self {
        Self {
            uuid: raw
                .uuid
                .clone()
                .or_else(|| raw.message_id.clone())
                .or_else(|| raw.snapshot.as_ref().and_then(|s| s.message_id.clone())),
            timestamp: raw.parsed_timestamp(),
            kind,
            content,
            tool_name: None,
            tool_input: None,
            tool_id: None,
            tool_use_id: None,
            is_error: None,
            subtype: None,
            compact_metadata: None,
            file_count: None,
            is_sidechain: raw.is_sidechain(),
        }
    }

    /// Typed view of `tool_input` for tool-use entries.
    pub fn typed_tool_input(&self) -> Option<ToolInput> {
        let name = self.tool_name.as_deref()?;
        let input = self.tool_input.as_ref()?;
        Some(ToolInput::from_tool(name, input))
    }
}
