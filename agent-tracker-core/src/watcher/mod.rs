//! File watchers feeding the store and the transcript view
//!
//! Both watchers are thin layers over [`Tailer`](crate::tail::Tailer): they
//! decode each new line and forward the result to a callback. Decode failures
//! go to the [`ErrorSink`](crate::error::ErrorSink) and never stop the batch.

mod events;
mod transcript;

pub use events::{ActionSink, SessionEventWatcher};
pub use transcript::{EntrySink, TranscriptWatcher};
