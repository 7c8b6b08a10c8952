//! Spreadsheet sources for sift
//!
//! Reading and writing the tables a classification task runs on, plus the
//! file utilities around it (combine, concatenate, divide).

pub mod combine;
pub mod delimited;
pub mod handler;
pub mod table;
pub mod xlsx;

pub use combine::{CombineResult, combine, concatenate, divide, merge_column, natural_sort_key};
pub use handler::{TableHandler, TableRegistry, content_hash};
pub use table::Table;
