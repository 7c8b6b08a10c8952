//! Per-task progress counters

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Chunk counters for the running task.
///
/// `num_chunks` is set once when a task starts; `processed_chunks` only
/// grows until the next [`Progress::reset`].
#[derive(Debug, Default)]
pub struct Progress {
    num_chunks: AtomicUsize,
    processed_chunks: AtomicUsize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, num_chunks: usize) {
        self.processed_chunks.store(0, Ordering::SeqCst);
        self.num_chunks.store(num_chunks, Ordering::SeqCst);
    }

    /// Record a new processed count; smaller values than the current one
    /// are ignored.
    pub fn advance_to(&self, processed_chunks: usize) {
        self.processed_chunks
            .fetch_max(processed_chunks, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.num_chunks.store(0, Ordering::SeqCst);
        self.processed_chunks.store(0, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            num_chunks: self.num_chunks.load(Ordering::SeqCst),
            processed_chunks: self.processed_chunks.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub num_chunks: usize,
    pub processed_chunks: usize,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.num_chunks > 0 && self.processed_chunks >= self.num_chunks
    }

    /// One-line status for display, naming the model being called
    pub fn status_line(&self, model: &str) -> String {
        StatusLine {
            snapshot: *self,
            model,
        }
        .to_string()
    }
}

struct StatusLine<'a> {
    snapshot: ProgressSnapshot,
    model: &'a str,
}

impl fmt::Display for StatusLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ProgressSnapshot {
            num_chunks,
            processed_chunks,
        } = self.snapshot;

        if num_chunks == 0 {
            write!(f, "Waiting for the chunks to be processed...")
        } else if processed_chunks == 0 {
            write!(f, "Sending {} chunks to {}...", num_chunks, self.model)
        } else if processed_chunks < num_chunks {
            write!(
                f,
                "Finished {} chunks out of {} chunks",
                processed_chunks, num_chunks
            )
        } else {
            write!(f, "Completed the classification!")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let progress = Progress::new();
        assert_eq!(
            progress.snapshot().status_line("gpt-3.5-turbo"),
            "Waiting for the chunks to be processed..."
        );

        progress.start(3);
        assert_eq!(
            progress.snapshot().status_line("gpt-3.5-turbo"),
            "Sending 3 chunks to gpt-3.5-turbo..."
        );

        progress.advance_to(2);
        assert_eq!(
            progress.snapshot().status_line("gpt-3.5-turbo"),
            "Finished 2 chunks out of 3 chunks"
        );

        progress.advance_to(3);
        assert!(progress.snapshot().is_complete());
        assert_eq!(
            progress.snapshot().status_line("gpt-3.5-turbo"),
            "Completed the classification!"
        );
    }

    #[test]
    fn test_processed_never_decreases() {
        let progress = Progress::new();
        progress.start(5);
        progress.advance_to(4);
        progress.advance_to(2);
        assert_eq!(progress.snapshot().processed_chunks, 4);

        progress.reset();
        assert_eq!(progress.snapshot(), ProgressSnapshot::default());
    }
}
