//! Typed tool inputs
//!
//! Tool-use blocks carry an untyped `input` object whose shape depends on the
//! tool name. [`ToolInput::parse`] validates the known shapes into typed
//! variants; [`ToolInput::from_tool`] never fails and falls back to
//! [`ToolInput::Other`] when a shape does not validate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const SUMMARY_MAX_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BashInput {
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadInput {
    pub file_path: String,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteInput {
    pub file_path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditInput {
    pub file_path: String,
    #[serde(default)]
    pub old_string: String,
    #[serde(default)]
    pub new_string: String,
    #[serde(default)]
    pub replace_all: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrepInput {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub glob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobInput {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub subagent_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebFetchInput {
    pub url: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoWriteInput {
    pub todos: Vec<TodoItem>,
}

/// Tool input keyed by tool name.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    Bash(BashInput),
    Read(ReadInput),
    Write(WriteInput),
    Edit(EditInput),
    Grep(GrepInput),
    Glob(GlobInput),
    Task(TaskInput),
    WebFetch(WebFetchInput),
    TodoWrite(TodoWriteInput),
    /// Unknown tool, or a known tool whose input did not validate
    Other { name: String, input: Value },
}

impl ToolInput {
    /// Validate `input` against the shape expected for `name`.
    ///
    /// Unknown tool names are not an error; they yield [`ToolInput::Other`].
    pub fn parse(name: &str, input: &Value) -> serde_json::Result<Self> {
        fn typed<T: serde::de::DeserializeOwned>(input: &Value) -> serde_json::Result<T> {
            T::deserialize(input)
        }

        Ok(match name {
            "Bash" => ToolInput::Bash(typed(input)?),
            "Read" => ToolInput::Read(typed(input)?),
            "Write" => ToolInput::Write(typed(input)?),
            "Edit" => ToolInput::Edit(typed(input)?),
            "Grep" => ToolInput::Grep(typed(input)?),
            "Glob" => ToolInput::Glob(typed(input)?),
            "Task" => ToolInput::Task(typed(input)?),
            "WebFetch" => ToolInput::WebFetch(typed(input)?),
            "TodoWrite" => ToolInput::TodoWrite(typed(input)?),
            _ => ToolInput::Other {
                name: name.to_string(),
                input: input.clone(),
            },
        })
    }

    /// Like [`parse`](Self::parse), but invalid shapes become `Other`.
    pub fn from_tool(name: &str, input: &Value) -> Self {
        Self::parse(name, input).unwrap_or_else(|e| {
            tracing::debug!(tool = name, error = %e, "Tool input did not match expected shape");
            ToolInput::Other {
                name: name.to_string(),
                input: input.clone(),
            }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            ToolInput::Bash(_) => "Bash",
            ToolInput::Read(_) => "Read",
            ToolInput::Write(_) => "Write",
            ToolInput::Edit(_) => "Edit",
            ToolInput::Grep(_) => "Grep",
            ToolInput::Glob(_) => "Glob",
            ToolInput::Task(_) => "Task",
            ToolInput::WebFetch(_) => "WebFetch",
            ToolInput::TodoWrite(_) => "TodoWrite",
            ToolInput::Other { name, .. } => name,
        }
    }

    /// One-line description for list views.
    pub fn summary(&self) -> String {
        let text = match self {
            ToolInput::Bash(b) => b
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| b.command.clone()),
            ToolInput::Read(r) => r.file_path.clone(),
            ToolInput::Write(w) => w.file_path.clone(),
            ToolInput::Edit(e) => e.file_path.clone(),
            ToolInput::Grep(g) => match &g.path {
                Some(path) => format!("{} in {}", g.pattern, path),
                None => g.pattern.clone(),
            },
            ToolInput::Glob(g) => g.pattern.clone(),
            ToolInput::Task(t) => t.description.clone(),
            ToolInput::WebFetch(w) => w.url.clone(),
            ToolInput::TodoWrite(t) => format!("{} todo(s)", t.todos.len()),
            ToolInput::Other { name, .. } => name.clone(),
        };
        first_line_truncated(&text, SUMMARY_MAX_CHARS)
    }
}

fn first_line_truncated(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let mut out: String = line.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
