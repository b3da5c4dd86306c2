//! Live transcript tail

use crate::error::ErrorSink;
use crate::tail::{LineSink, TailLine, TailOptions, Tailer};
use crate::transcript::{decode_line, parse_entry, ParsedTranscriptEntry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Receives each non-empty batch of newly parsed entries.
pub type EntrySink = Arc<dyn Fn(Vec<ParsedTranscriptEntry>) + Send + Sync>;

/// Follows one session transcript from its current end.
///
/// Each new line is parsed on its own with no lookahead, so a bash command
/// and its output arriving in separate records are delivered as two entries.
/// A full [`read_transcript`](crate::transcript::read_transcript) merges
/// them.
pub struct TranscriptWatcher {
    tailer: Tailer,
}

impl TranscriptWatcher {
    /// Watcher that waits for the file, retrying every `retry_interval`.
    pub fn new(
        path: impl Into<PathBuf>,
        retry_interval: Duration,
        on_new_entries: EntrySink,
        on_error: ErrorSink,
    ) -> Self {
        Self::with_options(
            path,
            TailOptions::live_transcript(retry_interval),
            on_new_entries,
            on_error,
        )
    }

    pub fn with_options(
        path: impl Into<PathBuf>,
        options: TailOptions,
        on_new_entries: EntrySink,
        on_error: ErrorSink,
    ) -> Self {
        let path = path.into();
        let source_name = path.display().to_string();
        let errors = on_error.clone();

        let on_lines: LineSink = Arc::new(move |lines: Vec<TailLine>| {
            let mut entries = Vec::new();
            for line in &lines {
                match decode_line(&source_name, line.number, &line.text) {
                    Ok(raw) => entries.extend(parse_entry(&raw, &[]).parsed),
                    Err(e) => errors(&e),
                }
            }
            if !entries.is_empty() {
                on_new_entries(entries);
            }
        });

        Self {
            tailer: Tailer::new(path, options, on_lines, on_error),
        }
    }

    pub fn path(&self) -> &Path {
        self.tailer.path()
    }

    pub fn start(&self) {
        self.tailer.start();
    }

    pub fn read_new_data(&self) {
        self.tailer.read_new_data();
    }

    pub fn stop(&self) {
        self.tailer.stop();
    }

    /// Whether the transcript exists and is being followed.
    pub fn is_attached(&self) -> bool {
        self.tailer.is_attached()
    }

    pub fn is_stopped(&self) -> bool {
        self.tailer.is_stopped()
    }
}
