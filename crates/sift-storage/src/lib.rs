//! Storage layer for sift
//!
//! This crate provides:
//! - The durable response cache (one JSON blob per chunk reply)

pub mod cache;
pub mod error;

pub use cache::{CacheEntry, ResponseCache};
pub use error::{Result, StorageError};
