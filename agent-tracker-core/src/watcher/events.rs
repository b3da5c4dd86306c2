//! Events-file watcher: JSONL lines in, store actions out

use crate::error::{Error, ErrorSink};
use crate::events::{parse_event_line, Action};
use crate::store::SessionStore;
use crate::tail::{LineSink, TailLine, TailOptions, Tailer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Receives each action decoded from the events file.
pub type ActionSink = Arc<dyn Fn(Action) + Send + Sync>;

/// Tails the global events file and turns each line into an [`Action`].
///
/// A line that fails to decode is reported to the error sink and skipped;
/// the rest of its batch is still delivered.
pub struct SessionEventWatcher {
    tailer: Tailer,
}

impl SessionEventWatcher {
    /// Watcher with the standard events-file options.
    pub fn new(path: impl Into<PathBuf>, on_action: ActionSink, on_error: ErrorSink) -> Self {
        Self::with_options(path, TailOptions::events_file(), on_action, on_error)
    }

    pub fn with_options(
        path: impl Into<PathBuf>,
        options: TailOptions,
        on_action: ActionSink,
        on_error: ErrorSink,
    ) -> Self {
        let path = path.into();
        let source_name = path.display().to_string();
        let errors = on_error.clone();

        let on_lines: LineSink = Arc::new(move |lines: Vec<TailLine>| {
            let mut dispatched = 0usize;
            for line in &lines {
                match parse_event_line(&line.text) {
                    Ok(event) => {
                        on_action(Action::from(event));
                        dispatched += 1;
                    }
                    Err(e) => errors(&Error::Parse {
                        source_name: source_name.clone(),
                        line: line.number,
                        message: e.to_string(),
                    }),
                }
            }
            tracing::debug!(
                lines = lines.len(),
                dispatched,
                "Processed events batch"
            );
        });

        Self {
            tailer: Tailer::new(path, options, on_lines, on_error),
        }
    }

    /// Watcher that dispatches straight into `store`.
    pub fn for_store(
        path: impl Into<PathBuf>,
        options: TailOptions,
        store: Arc<SessionStore>,
        on_error: ErrorSink,
    ) -> Self {
        let on_action: ActionSink = Arc::new(move |action| store.dispatch(action));
        Self::with_options(path, options, on_action, on_error)
    }

    pub fn path(&self) -> &Path {
        self.tailer.path()
    }

    /// Create the file if needed and replay its history.
    pub fn start(&self) {
        self.tailer.start();
    }

    pub fn read_new_data(&self) {
        self.tailer.read_new_data();
    }

    pub fn stop(&self) {
        self.tailer.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.tailer.is_stopped()
    }
}
