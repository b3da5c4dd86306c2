//! Raw transcript records as written by the agent
//!
//! Every field is optional (`#[serde(default)]`) so a record missing fields
//! still deserializes; unknown content block kinds collapse into
//! [`ContentBlock::Unknown`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One line of a session transcript.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTranscriptEntry {
    pub uuid: Option<String>,
    pub timestamp: Option<String>,
    /// `user`, `assistant`, `system` or `file-history-snapshot`
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub message: Option<RawMessage>,
    pub is_meta: Option<bool>,
    pub is_sidechain: Option<bool>,

    // System records
    pub subtype: Option<String>,
    pub content: Option<serde_json::Value>,
    pub compact_metadata: Option<serde_json::Value>,

    // File history snapshots
    pub message_id: Option<String>,
    pub snapshot: Option<RawSnapshot>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawMessage {
    pub role: Option<String>,
    pub content: Option<RawContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    // Catch-all for image and other block types
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSnapshot {
    pub message_id: Option<String>,
    pub timestamp: Option<String>,
    pub tracked_file_backups: Option<serde_json::Map<String, serde_json::Value>>,
}

impl RawTranscriptEntry {
    pub fn is_type(&self, kind: &str) -> bool {
        self.entry_type.as_deref() == Some(kind)
    }

    pub fn is_meta(&self) -> bool {
        self.is_meta.unwrap_or(false)
    }

    pub fn is_sidechain(&self) -> bool {
        self.is_sidechain.unwrap_or(false)
    }

    pub fn message_content(&self) -> Option<&RawContent> {
        self.message.as_ref().and_then(|m| m.content.as_ref())
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        match self.message_content() {
            Some(RawContent::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }

    /// Message text with all text blocks joined by newlines.
    pub fn flattened_text(&self) -> String {
        match self.message_content() {
            Some(RawContent::Text(text)) => text.clone(),
            Some(RawContent::Blocks(blocks)) => join_text_blocks(blocks),
            None => String::new(),
        }
    }

    /// Parsed record timestamp, falling back to the snapshot's own timestamp.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .or_else(|| self.snapshot.as_ref().and_then(|s| s.timestamp.as_deref()))
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

pub(crate) fn join_text_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
