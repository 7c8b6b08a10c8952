use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Source unavailable: {}: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Model call failed for chunk {position}: {reason}")]
    ModelCall { position: usize, reason: String },

    #[error("A classification task is already running")]
    TaskInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error aborts a whole task and should be shown to the user.
    ///
    /// Model-call failures are recovered per chunk and never reach the user
    /// as a task failure.
    pub fn aborts_task(&self) -> bool {
        !matches!(self, Error::ModelCall { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
