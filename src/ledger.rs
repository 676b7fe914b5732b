//! Append-only local ledger plus the advisory run lock.
//!
//! The ledger is a plain newline-delimited text file. Records are written
//! here before any remote upload is attempted, so a crash mid-sync never
//! loses a locally recorded measurement. Existing content is never
//! truncated or reordered.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Another run (or a crashed run's leftover lock file) holds the lock.
    #[error("run lock already held at {path}")]
    Locked { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Handle to the local ledger file. The file is created on first append.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one pre-formatted line (caller supplies the trailing newline).
    ///
    /// Opens in append mode, writes, flushes, and releases the handle on
    /// every exit path. Never rewrites existing content.
    pub fn append(&self, line: &str) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Number of lines currently in the ledger; a missing file counts as 0.
    pub fn line_count(&self) -> Result<usize, LedgerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// Advisory lock held for the measure-append-sync section of a run.
///
/// Turns the "the external scheduler never overlaps two invocations"
/// assumption into an enforced invariant: the second of two overlapping
/// runs fails with [`LedgerError::Locked`] instead of interleaving appends.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                tracing::debug!(path = %path.display(), "acquired run lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(LedgerError::Locked { path })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}
