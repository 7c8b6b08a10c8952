//! Table format handlers

use std::path::Path;

use sift_core::{Error, Result};

use crate::Table;
use crate::delimited::DelimitedHandler;
use crate::xlsx::XlsxHandler;

/// Trait for reading and writing one spreadsheet format
pub trait TableHandler: Send + Sync {
    /// Read the first sheet of `path`; the first row is the header
    fn read(&self, path: &Path) -> Result<Table>;

    /// Write `table` to `path`, replacing any existing file
    fn write(&self, table: &Table, path: &Path) -> Result<()>;

    /// Check if this handler can handle the given file extension (lowercase)
    fn can_handle(&self, extension: &str) -> bool;
}

/// Picks a handler by file extension; anything unrecognised is read as
/// delimited text.
pub struct TableRegistry {
    handlers: Vec<Box<dyn TableHandler>>,
    fallback: DelimitedHandler,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self {
            handlers: vec![Box::new(XlsxHandler), Box::new(DelimitedHandler)],
            fallback: DelimitedHandler,
        }
    }

    pub fn handler_for(&self, path: &Path) -> &dyn TableHandler {
        let extension = extension_of(path);
        self.handlers
            .iter()
            .find(|h| h.can_handle(&extension))
            .map(|h| &**h)
            .unwrap_or(&self.fallback as &dyn TableHandler)
    }

    pub fn read(&self, path: &Path) -> Result<Table> {
        if !path.is_file() {
            return Err(Error::SourceUnavailable {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        self.handler_for(path).read(path)
    }

    pub fn write(&self, table: &Table, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        self.handler_for(path).write(table, path)
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Hex BLAKE3 hash of a file's bytes
pub fn content_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::SourceUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}
