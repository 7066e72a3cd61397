//! Progress reporting and cooperative cancellation for long operations.

/// Receives progress callbacks from a running repack.
///
/// All methods have no-op defaults, so implementors only override what they
/// display. Callbacks run on the repacking thread; keep them cheap.
pub trait ProgressReporter: Send {
    /// Called once before any file is processed, with the total entry count.
    fn on_total(&mut self, total_entries: usize) {
        let _ = total_entries;
    }

    /// Called when an entry's data is about to be written.
    fn on_file_start(&mut self, index: usize, path: &str) {
        let _ = (index, path);
    }

    /// Called after an entry's data has been written, with the byte count.
    fn on_file_complete(&mut self, index: usize, bytes_written: u64) {
        let _ = (index, bytes_written);
    }

    /// Polled before destructive work begins. Returning `true` aborts the
    /// operation with [`Error::Cancelled`](crate::Error::Cancelled), leaving
    /// the archive untouched.
    fn should_cancel(&self) -> bool {
        false
    }
}

/// A reporter that discards all callbacks and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}
