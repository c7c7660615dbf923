
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Result, WardError};

/// Exclusive ingestion lock, released when dropped
///
/// The lock is a file created with create-new semantics, so a second
/// process fails immediately instead of waiting.
#[derive(Debug)]
pub struct IngestLock {
    path: PathBuf,
}

impl IngestLock {
    #[inline]
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(WardError::IngestLocked(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        writeln!(
            file,
            "pid={} started={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;

        debug!("Acquired ingestion lock {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn is_held(path: &Path) -> bool {
        path.exists()
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IngestLock {
    #[inline]
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released ingestion lock {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove ingestion lock {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
