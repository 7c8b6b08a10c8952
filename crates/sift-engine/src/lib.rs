//! Classification engine for sift
//!
//! Ties the core algorithms to their collaborators: the bounded concurrent
//! dispatcher, the per-task orchestrator, the spreadsheet utilities,
//! progress counters and the session audit log.

pub mod audit;
pub mod dispatch;
pub mod files;
pub mod pipeline;
pub mod progress;

pub use audit::AuditLog;
pub use dispatch::{DispatchReport, Dispatcher, ResponseSource, TaskContext};
pub use files::{CombineOutcome, FileTools};
pub use pipeline::{
    Pipeline, PipelineSettings, RowCountMismatch, TaskOutcome, TaskRequest,
};
pub use progress::{Progress, ProgressSnapshot};
