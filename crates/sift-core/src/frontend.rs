//! What the pipeline needs from whatever is driving it (terminal, GUI, tests)

/// Capabilities a frontend exposes to the classification pipeline.
///
/// Calls may arrive from dispatch workers, so implementations must be
/// thread-safe and must not block.
pub trait Frontend: Send + Sync {
    /// Total number of chunks for the current task (0 after a reset)
    fn set_num_chunks(&self, num_chunks: usize);

    /// Number of chunks finished so far; never decreases within a task
    fn set_processed_chunks(&self, processed_chunks: usize);

    /// A task-level failure the user should see
    fn show_error(&self, message: &str);

    /// Header row of the opened source
    fn set_column_names(&self, columns: &[String]);
}

/// Frontend that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFrontend;

impl Frontend for NoopFrontend {
    fn set_num_chunks(&self, _num_chunks: usize) {}

    fn set_processed_chunks(&self, _processed_chunks: usize) {}

    fn show_error(&self, _message: &str) {}

    fn set_column_names(&self, _columns: &[String]) {}
}
