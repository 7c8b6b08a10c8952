use sift_core::Frontend;
use tracing::debug;

/// Terminal frontend: errors go to stderr, progress is polled separately.
pub struct TerminalFrontend;

impl Frontend for TerminalFrontend {
    fn set_num_chunks(&self, num_chunks: usize) {
        debug!("Task has {} chunks", num_chunks);
    }

    fn set_processed_chunks(&self, processed_chunks: usize) {
        debug!("{} chunks processed", processed_chunks);
    }

    fn show_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }

    fn set_column_names(&self, columns: &[String]) {
        debug!("Columns: {}", columns.join(", "));
    }
}
