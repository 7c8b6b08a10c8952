//! Append-only audit log for a session

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sift_core::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::warn;

/// Timestamped event lines written to `{YYYYMMDD-HH_MM_SS}_log.txt`.
///
/// The file is never read back; a failed write is reported through
/// `tracing` and otherwise ignored.
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Create a new log file in `dir`, named after the current local time
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = now()
            .format(format_description!(
                "[year][month][day]-[hour]_[minute]_[second]"
            ))
            .map_err(|e| anyhow::anyhow!("failed to format log file name: {e}"))?;
        Self::open(dir.join(format!("{name}_log.txt")))
    }

    /// Append to the log at `path`, creating it if needed
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, message: impl AsRef<str>) {
        let timestamp = now()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown-time".to_string());
        let line = format!("{} - {}\n", timestamp, message.as_ref());

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
