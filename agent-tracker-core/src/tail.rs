//! Incremental tailing of append-only JSONL files
//!
//! A [`TailCursor`] remembers how far into a file it has read and returns only
//! the complete-or-not lines appended since. A [`Tailer`] wraps a cursor with
//! the live machinery: an OS change watch, a retry timer for files that do not
//! exist yet, and a [`ReadGuard`] so a burst of change notifications never
//! causes two overlapping reads of the same file.
//!
//! # Read semantics
//!
//! - Reads cover `[position, file_size)`. Afterwards `position == file_size`,
//!   even if some of the returned lines later fail to parse.
//! - `file_size < position` means the file was truncated or recreated: the
//!   cursor resets to 0 and reads from the start.
//! - Blank lines are dropped. Every delivered line carries its 1-based line
//!   number in the file, counted from the start even when history was skipped.
//!
//! # Failure model
//!
//! [`Tailer`] never returns errors from its live operations. IO and watch
//! failures go to the caller's [`ErrorSink`]; the next change notification
//! retries the read.

use crate::error::{Error, ErrorSink, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

/// One non-blank line read from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailLine {
    /// 1-based line number within the file
    pub number: usize,
    pub text: String,
}

/// Receives each non-empty batch of new lines.
pub type LineSink = Arc<dyn Fn(Vec<TailLine>) + Send + Sync>;

// ============================================
// TailCursor
// ============================================

/// Tracks the byte offset of one file for incremental reads.
#[derive(Debug, Clone)]
pub struct TailCursor {
    path: PathBuf,
    position: u64,
    /// Newlines before `position`
    lines_before: usize,
}

impl TailCursor {
    /// Cursor at the start of the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            position: 0,
            lines_before: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move to the start so existing history is consumed by the next read.
    pub fn reset(&mut self) {
        self.position = 0;
        self.lines_before = 0;
    }

    /// Move to the current end of file so existing history is skipped.
    ///
    /// The skipped lines are still counted so later line numbers match the
    /// file.
    pub fn seek_to_end(&mut self) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| Error::file(&self.path, e))?;
        let mut reader = BufReader::new(file);
        let (mut bytes, mut newlines) = (0u64, 0usize);
        loop {
            let chunk = reader.fill_buf().map_err(|e| Error::file(&self.path, e))?;
            if chunk.is_empty() {
                break;
            }
            newlines += chunk.iter().filter(|&&b| b == b'\n').count();
            let len = chunk.len();
            bytes += len as u64;
            reader.consume(len);
        }
        self.position = bytes;
        self.lines_before = newlines;
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| Error::file(&self.path, e))
    }

    /// Read the lines appended since the last call.
    pub fn read_new_lines(&mut self) -> Result<Vec<TailLine>> {
        let file_size = self.file_size()?;

        // Detect file truncation (e.g., file was replaced)
        if file_size < self.position {
            tracing::info!(
                path = %self.path.display(),
                file_size,
                position = self.position,
                "File shrank below read position, restarting from beginning"
            );
            self.reset();
            return self.read_new_lines();
        }

        if file_size == self.position {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path).map_err(|e| Error::file(&self.path, e))?;
        file.seek(SeekFrom::Start(self.position))
            .map_err(|e| Error::file(&self.path, e))?;

        let wanted = file_size - self.position;
        let mut buf = Vec::with_capacity(wanted as usize);
        file.take(wanted)
            .read_to_end(&mut buf)
            .map_err(|e| Error::file(&self.path, e))?;

        let from = self.position;
        self.position += buf.len() as u64;

        let lines = split_lines(&buf, self.lines_before + 1);
        self.lines_before += buf.iter().filter(|&&b| b == b'\n').count();
        tracing::debug!(
            path = %self.path.display(),
            from,
            to = self.position,
            lines = lines.len(),
            "Read appended data"
        );
        Ok(lines)
    }
}

/// Split raw bytes into non-blank numbered lines, tolerating CRLF and invalid
/// UTF-8. `first_number` is the line number of the first segment.
fn split_lines(buf: &[u8], first_number: usize) -> Vec<TailLine> {
    String::from_utf8_lossy(buf)
        .split('\n')
        .enumerate()
        .map(|(i, line)| (first_number + i, line.strip_suffix('\r').unwrap_or(line)))
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| TailLine {
            number,
            text: line.to_string(),
        })
        .collect()
}

// ============================================
// ReadGuard
// ============================================

/// "Read in progress" flag.
///
/// A trigger that finds a read already running returns without reading. The
/// unread bytes stay past the cursor position, so the next trigger picks them
/// up: overlapping triggers are coalesced, never lost.
#[derive(Debug, Default)]
pub struct ReadGuard {
    busy: AtomicBool,
}

impl ReadGuard {
    /// Claim the guard, or `None` if a read is already running.
    pub fn try_begin(&self) -> Option<ReadToken<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ReadToken { guard: self })
    }

    pub fn is_reading(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the [`ReadGuard`] when dropped.
pub struct ReadToken<'a> {
    guard: &'a ReadGuard,
}

impl Drop for ReadToken<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

// ============================================
// Tailer
// ============================================

/// Where reading begins once the file is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Consume existing history once
    Beginning,
    /// Skip existing history; only new appends are delivered
    End,
}

#[derive(Debug, Clone)]
pub struct TailOptions {
    pub start: StartPosition,
    /// Create the parent directory and an empty file when missing
    pub create_if_missing: bool,
    /// Poll interval while waiting for a missing file to appear
    pub retry_interval: Duration,
    /// Register an OS change watch; when false, reads happen only through
    /// explicit [`Tailer::read_new_data`] calls
    pub watch: bool,
}

impl TailOptions {
    /// Global events file: created on demand, full history replayed.
    pub fn events_file() -> Self {
        Self {
            start: StartPosition::Beginning,
            create_if_missing: true,
            retry_interval: Duration::from_secs(2),
            watch: true,
        }
    }

    /// Live transcript tail: wait for the file, skip existing history.
    pub fn live_transcript(retry_interval: Duration) -> Self {
        Self {
            start: StartPosition::End,
            create_if_missing: false,
            retry_interval,
            watch: true,
        }
    }

    pub fn without_watch(mut self) -> Self {
        self.watch = false;
        self
    }
}

/// Live tail of one append-only file.
///
/// Dropping a `Tailer` stops it.
pub struct Tailer {
    inner: Arc<TailerInner>,
}

struct TailerInner {
    path: PathBuf,
    options: TailOptions,
    cursor: Mutex<TailCursor>,
    guard: ReadGuard,
    on_lines: LineSink,
    on_error: ErrorSink,
    watcher: Mutex<Option<RecommendedWatcher>>,
    retry: Mutex<Option<RetryTimer>>,
    started: AtomicBool,
    attached: AtomicBool,
    stopped: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Tailer {
    pub fn new(
        path: impl Into<PathBuf>,
        options: TailOptions,
        on_lines: LineSink,
        on_error: ErrorSink,
    ) -> Self {
        let path = path.into();
        Self {
            inner: Arc::new(TailerInner {
                cursor: Mutex::new(TailCursor::new(path.clone())),
                path,
                options,
                guard: ReadGuard::default(),
                on_lines,
                on_error,
                watcher: Mutex::new(None),
                retry: Mutex::new(None),
                started: AtomicBool::new(false),
                attached: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Attach to the file, or schedule retries until it exists.
    ///
    /// Calling `start` more than once, or after [`stop`](Self::stop), does
    /// nothing.
    pub fn start(&self) {
        let inner = &self.inner;
        if inner.stopped.load(Ordering::SeqCst) || inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if !inner.path.exists() {
            if inner.options.create_if_missing {
                if let Err(e) = create_empty(&inner.path) {
                    (inner.on_error)(&e);
                    return;
                }
                tracing::info!(path = %inner.path.display(), "Created missing file");
            } else {
                tracing::debug!(
                    path = %inner.path.display(),
                    interval_ms = inner.options.retry_interval.as_millis() as u64,
                    "File not created yet, scheduling retry"
                );
                inner.schedule_retry();
                return;
            }
        }

        inner.attach(inner.options.start);
    }

    /// Read whatever was appended since the last read.
    ///
    /// Returns immediately if another read of this file is in progress.
    pub fn read_new_data(&self) {
        self.inner.read_new_data();
    }

    /// Stop watching. Idempotent; cancels any pending retry and releases the
    /// OS watch handle.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Current cursor position in bytes.
    pub fn position(&self) -> u64 {
        lock(&self.inner.cursor).position()
    }

    /// Whether the file has been found and a baseline established.
    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl TailerInner {
    fn attach(self: &Arc<Self>, start: StartPosition) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut cursor = lock(&self.cursor);
            match start {
                StartPosition::Beginning => cursor.reset(),
                StartPosition::End => {
                    if let Err(e) = cursor.seek_to_end() {
                        (self.on_error)(&e);
                    }
                }
            }
        }
        self.attached.store(true, Ordering::SeqCst);

        if self.options.watch {
            if let Err(e) = self.install_watch() {
                (self.on_error)(&e);
            }
        }

        tracing::info!(
            path = %self.path.display(),
            start = ?start,
            position = lock(&self.cursor).position(),
            "Tailing file"
        );

        if start == StartPosition::Beginning {
            self.read_new_data();
        }
    }

    fn read_new_data(&self) {
        if self.stopped.load(Ordering::SeqCst) || !self.attached.load(Ordering::SeqCst) {
            return;
        }

        let Some(_token) = self.guard.try_begin() else {
            tracing::trace!(path = %self.path.display(), "Read already in progress, coalescing");
            return;
        };

        let result = lock(&self.cursor).read_new_lines();
        match result {
            Ok(lines) if lines.is_empty() => {}
            Ok(lines) => (self.on_lines)(lines),
            Err(e) => (self.on_error)(&e),
        }
    }

    fn install_watch(self: &Arc<Self>) -> Result<()> {
        let weak: Weak<TailerInner> = Arc::downgrade(self);
        let file_name: Option<OsString> = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match res {
                    Ok(event) => {
                        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            return;
                        }
                        // Parent directory is watched; match by file name so
                        // symlinked temp dirs still compare equal
                        let ours = event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == file_name.as_deref());
                        if ours {
                            inner.read_new_data();
                        }
                    }
                    Err(e) => (inner.on_error)(&Error::Watch(e)),
                }
            })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        // Checked under the slot lock so a concurrent stop() cannot miss it
        let mut slot = lock(&self.watcher);
        if self.stopped.load(Ordering::SeqCst) {
            drop(slot);
            drop(watcher);
            tracing::debug!(
                path = %self.path.display(),
                "Stopped while attaching, watch released"
            );
            return Ok(());
        }
        *slot = Some(watcher);
        Ok(())
    }

    fn schedule_retry(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let timer = RetryTimer::spawn(self.options.retry_interval, move || {
            let Some(inner) = weak.upgrade() else {
                return true;
            };
            if inner.stopped.load(Ordering::SeqCst) {
                return true;
            }
            if !inner.path.exists() {
                return false;
            }
            tracing::info!(path = %inner.path.display(), "File appeared, attaching");
            // Everything in a file created after we started waiting is new
            inner.attach(StartPosition::Beginning);
            true
        });

        match timer {
            Ok(timer) => *lock(&self.retry) = Some(timer),
            Err(e) => (self.on_error)(&Error::Io(e)),
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let retry = lock(&self.retry).take();
        drop(retry);
        let watcher = lock(&self.watcher).take();
        drop(watcher);
        tracing::debug!(path = %self.path.display(), "Tailer stopped");
    }
}

fn create_empty(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::file(path, e))?;
    Ok(())
}

// ============================================
// RetryTimer
// ============================================

/// Calls `tick` every `interval` on a helper thread until it returns `true`
/// or the timer is dropped.
struct RetryTimer {
    _cancel: mpsc::Sender<()>,
}

impl RetryTimer {
    fn spawn<F>(interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (cancel, cancelled) = mpsc::channel::<()>();
        thread::Builder::new()
            .name("tail-retry".to_string())
            .spawn(move || loop {
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if tick() {
                            break;
                        }
                    }
                    // Sender dropped or explicit cancel
                    _ => break,
                }
            })?;
        Ok(Self { _cancel: cancel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    type Collected = Arc<Mutex<Vec<String>>>;

    fn texts(lines: Vec<TailLine>) -> Vec<String> {
        lines.into_iter().map(|line| line.text).collect()
    }

    fn numbers(lines: &[TailLine]) -> Vec<usize> {
        lines.iter().map(|line| line.number).collect()
    }

    fn collecting_sinks() -> (LineSink, ErrorSink, Collected, Arc<Mutex<usize>>) {
        let lines: Collected = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(0usize));
        let l = lines.clone();
        let e = errors.clone();
        (
            Arc::new(move |batch: Vec<TailLine>| l.lock().unwrap().extend(texts(batch))),
            Arc::new(move |_err: &Error| *e.lock().unwrap() += 1),
            lines,
            errors,
        )
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn test_cursor_reads_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "{\"a\":1}\n{\"b\":2}\n").unwrap();

        let mut cursor = TailCursor::new(&path);
        let lines = texts(cursor.read_new_lines().unwrap());
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_cursor_second_read_without_new_bytes_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "{\"a\":1}\n").unwrap();

        let mut cursor = TailCursor::new(&path);
        assert_eq!(cursor.read_new_lines().unwrap().len(), 1);
        assert!(cursor.read_new_lines().unwrap().is_empty());
    }

    #[test]
    fn test_cursor_position_tracks_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "").unwrap();

        let mut cursor = TailCursor::new(&path);
        for i in 0..5 {
            append(&path, &format!("{{\"n\":{}}}\n", i));
            let lines = texts(cursor.read_new_lines().unwrap());
            assert_eq!(lines, vec![format!("{{\"n\":{}}}", i)]);
            assert_eq!(cursor.position(), fs::metadata(&path).unwrap().len());
        }
    }

    #[test]
    fn test_cursor_truncation_resets_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n").unwrap();

        let mut cursor = TailCursor::new(&path);
        cursor.read_new_lines().unwrap();

        fs::write(&path, "{\"x\":1}\n").unwrap();
        let lines = cursor.read_new_lines().unwrap();
        assert_eq!(numbers(&lines), vec![1]);
        assert_eq!(texts(lines), vec!["{\"x\":1}"]);
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn test_cursor_skips_blank_lines_and_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "one\r\n\n   \ntwo\n").unwrap();

        let mut cursor = TailCursor::new(&path);
        let lines = cursor.read_new_lines().unwrap();
        assert_eq!(numbers(&lines), vec![1, 4]);
        assert_eq!(texts(lines), vec!["one", "two"]);
    }

    #[test]
    fn test_cursor_unterminated_line_is_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "{\"a\":1}\n{\"b\"").unwrap();

        let mut cursor = TailCursor::new(&path);
        let lines = texts(cursor.read_new_lines().unwrap());
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\""]);
        assert_eq!(cursor.position(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_cursor_seek_to_end_skips_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "old\n").unwrap();

        let mut cursor = TailCursor::new(&path);
        cursor.seek_to_end().unwrap();
        assert!(cursor.read_new_lines().unwrap().is_empty());

        append(&path, "new\n");
        let lines = cursor.read_new_lines().unwrap();
        assert_eq!(numbers(&lines), vec![2]);
        assert_eq!(texts(lines), vec!["new"]);
    }

    #[test]
    fn test_cursor_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cursor = TailCursor::new(dir.path().join("nope.jsonl"));
        assert!(matches!(cursor.read_new_lines(), Err(Error::File { .. })));
    }

    #[test]
    fn test_read_guard_rejects_overlap() {
        let guard = ReadGuard::default();
        let token = guard.try_begin().expect("first read claims the guard");
        assert!(guard.is_reading());
        assert!(guard.try_begin().is_none());

        drop(token);
        assert!(!guard.is_reading());
        assert!(guard.try_begin().is_some());
    }

    #[test]
    fn test_tailer_creates_missing_events_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/sessions.jsonl");
        let (on_lines, on_error, lines, errors) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::events_file().without_watch(),
            on_lines,
            on_error,
        );
        tailer.start();

        assert!(path.exists());
        assert!(tailer.is_attached());
        assert!(lines.lock().unwrap().is_empty());
        assert_eq!(*errors.lock().unwrap(), 0);
    }

    #[test]
    fn test_tailer_beginning_replays_history_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.jsonl");
        fs::write(&path, "a\nb\n").unwrap();
        let (on_lines, on_error, lines, _) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::events_file().without_watch(),
            on_lines,
            on_error,
        );
        tailer.start();
        assert_eq!(*lines.lock().unwrap(), vec!["a", "b"]);

        tailer.read_new_data();
        assert_eq!(lines.lock().unwrap().len(), 2);

        append(&path, "c\n");
        tailer.read_new_data();
        assert_eq!(*lines.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(tailer.position(), 6);
    }

    #[test]
    fn test_tailer_end_skips_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.jsonl");
        fs::write(&path, "old-1\nold-2\n").unwrap();
        let (on_lines, on_error, lines, _) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::live_transcript(Duration::from_millis(20)).without_watch(),
            on_lines,
            on_error,
        );
        tailer.start();
        tailer.read_new_data();
        assert!(lines.lock().unwrap().is_empty());

        append(&path, "new\n");
        tailer.read_new_data();
        assert_eq!(*lines.lock().unwrap(), vec!["new"]);
    }

    #[test]
    fn test_tailer_retries_until_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.jsonl");
        let (on_lines, on_error, lines, errors) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::live_transcript(Duration::from_millis(20)).without_watch(),
            on_lines,
            on_error,
        );
        tailer.start();
        assert!(!tailer.is_attached());

        // Reads before the file exists are no-ops, not errors
        tailer.read_new_data();
        assert_eq!(*errors.lock().unwrap(), 0);

        // Rename so the file never appears empty
        let staging = dir.path().join("staging.tmp");
        fs::write(&staging, "first\n").unwrap();
        fs::rename(&staging, &path).unwrap();
        assert!(wait_for(|| tailer.is_attached()));
        assert!(wait_for(|| lines.lock().unwrap().len() == 1));
        assert_eq!(*lines.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn test_tailer_stop_is_idempotent_and_cancels_retry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.jsonl");
        let (on_lines, on_error, lines, _) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::live_transcript(Duration::from_millis(10)).without_watch(),
            on_lines,
            on_error,
        );
        tailer.start();
        tailer.stop();
        tailer.stop();
        assert!(tailer.is_stopped());

        fs::write(&path, "late\n").unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(!tailer.is_attached());
        tailer.read_new_data();
        assert!(lines.lock().unwrap().is_empty());
    }

    #[test]
    fn test_tailer_reports_io_errors_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.jsonl");
        fs::write(&path, "a\n").unwrap();
        let (on_lines, on_error, _, errors) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::events_file().without_watch(),
            on_lines,
            on_error,
        );
        tailer.start();

        fs::remove_file(&path).unwrap();
        tailer.read_new_data();
        assert_eq!(*errors.lock().unwrap(), 1);
    }

    #[test]
    fn test_cursor_numbers_continue_across_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "a\nb\n\nc").unwrap();

        let mut cursor = TailCursor::new(&path);
        let lines = cursor.read_new_lines().unwrap();
        assert_eq!(numbers(&lines), vec![1, 2, 4]);

        // Rest of line 4, then line 5
        append(&path, "d\ne\n");
        let lines = cursor.read_new_lines().unwrap();
        assert_eq!(numbers(&lines), vec![4, 5]);
        assert_eq!(texts(lines), vec!["d", "e"]);
    }

    #[test]
    fn test_nested_read_is_coalesced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.jsonl");
        fs::write(&path, "a\nb\n").unwrap();

        let batches: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Weak<TailerInner>>>> = Arc::new(Mutex::new(None));
        let (seen, inner_slot, target) = (batches.clone(), slot.clone(), path.clone());
        let on_lines: LineSink = Arc::new(move |batch: Vec<TailLine>| {
            let first = {
                let mut seen = seen.lock().unwrap();
                seen.push(texts(batch));
                seen.len() == 1
            };
            if first {
                // Bytes land while the outer read still holds the guard
                append(&target, "c\n");
            }
            let inner = inner_slot.lock().unwrap().as_ref().and_then(Weak::upgrade);
            if let Some(inner) = inner {
                inner.read_new_data();
            }
        });
        let (_, on_error, _, errors) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::events_file().without_watch(),
            on_lines,
            on_error,
        );
        *slot.lock().unwrap() = Some(Arc::downgrade(&tailer.inner));

        tailer.start();
        assert_eq!(*batches.lock().unwrap(), vec![vec!["a", "b"]]);
        assert_eq!(tailer.position(), 4);
        assert!(!tailer.inner.guard.is_reading());

        tailer.read_new_data();
        assert_eq!(
            *batches.lock().unwrap(),
            vec![vec!["a", "b"], vec!["c"]]
        );
        assert_eq!(tailer.position(), 6);
        assert_eq!(*errors.lock().unwrap(), 0);
    }

    #[test]
    fn test_stop_releases_watch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.jsonl");
        let (on_lines, on_error, _, _) = collecting_sinks();

        let tailer = Tailer::new(&path, TailOptions::events_file(), on_lines, on_error);
        tailer.start();
        assert!(lock(&tailer.inner.watcher).is_some());

        tailer.stop();
        assert!(lock(&tailer.inner.watcher).is_none());
    }

    #[test]
    fn test_watch_installed_after_stop_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.jsonl");
        let (on_lines, on_error, _, errors) = collecting_sinks();

        let tailer = Tailer::new(
            &path,
            TailOptions::live_transcript(Duration::from_millis(20)),
            on_lines,
            on_error,
        );
        tailer.start();
        tailer.stop();

        // Retry thread attaching after stop() already ran
        fs::write(&path, "late\n").unwrap();
        tailer.inner.install_watch().unwrap();
        assert!(lock(&tailer.inner.watcher).is_none());
        assert_eq!(*errors.lock().unwrap(), 0);
    }
}
