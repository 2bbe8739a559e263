use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

/// Audit trail for maintenance failures, one file per failure.
///
/// Files are written before the failure is handed back to the caller, so
/// the record survives whatever the caller does with the error.
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    dir: PathBuf,
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl DiagnosticSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<timestamp>-<uuid>.sql` holding the context line and the
    /// driver message. Returns the file path, or `None` if it could not
    /// be written.
    pub fn record(&self, context: &str, message: &str) -> Option<PathBuf> {
        let name = format!(
            "{}-{}.sql",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            Uuid::new_v4()
        );
        let path = self.dir.join(name);
        let body = format!("-- {}\n{}\n", context, message);

        match fs::write(&path, body) {
            Ok(()) => {
                warn!(path = %path.display(), "{}: {}", context, message);
                Some(path)
            }
            Err(e) => {
                error!(
                    dir = %self.dir.display(),
                    "could not write diagnostic file ({}); original failure: {}: {}",
                    e, context, message
                );
                None
            }
        }
    }
}
