//! Core domain models and logic for sift
//!
//! This crate contains:
//! - Domain models (RowRecord, Chunk, TaskKind, Fingerprint)
//! - Chunk builder (token-budgeted batching of rows)
//! - Response parser and label reconciliation
//! - The frontend capability trait the pipeline reports through

pub mod chunk;
pub mod error;
pub mod fingerprint;
pub mod frontend;
pub mod parse;
pub mod reconcile;
pub mod record;
pub mod task;

pub use chunk::{Chunk, ChunkBuilder, ChunkResponse};
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, FingerprintParts};
pub use frontend::{Frontend, NoopFrontend};
pub use parse::{LabelMap, ParseIssue, ParseWarning, ParsedResponse, parse_response};
pub use reconcile::{LabelColumn, Reconciliation, reconcile};
pub use record::{RowId, RowRecord};
pub use task::{PromptTemplate, RowFilter, TaskKind, TaskPolicy};
