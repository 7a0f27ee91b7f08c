// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The work-state journal: a single JSON document at a
//! project-relative path that lets a long-running directive survive a
//! process restart.
//!
//! I/O goes through a trait so the write-to-temp-then-rename sequence can
//! be exercised without touching a real filesystem. This journal is not
//! compressed and carries no fsync requirement — it is one human-readable
//! JSON document, not an event-sourced snapshot, and the only durability
//! guarantee is "complete snapshot or absent", which atomic rename
//! already provides.

use hub_core::{Clock, WorkState};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Abstracts journal I/O so the atomic-write sequence can be exercised
/// without a real filesystem.
pub trait JournalWriter: Send + Sync + 'static {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), JournalError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), JournalError>;
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, JournalError>;
    fn remove(&self, path: &Path) -> Result<(), JournalError>;
    /// Move a file aside instead of deleting it outright, used when the
    /// journal is present but unreadable (archived, not lost).
    fn archive(&self, path: &Path) -> Result<(), JournalError>;
}

#[derive(Clone, Default)]
pub struct FsJournalWriter;

impl JournalWriter for FsJournalWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), JournalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, data)?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), JournalError> {
        fs::rename(from, to)?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, JournalError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, path: &Path) -> Result<(), JournalError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn archive(&self, path: &Path) -> Result<(), JournalError> {
        let archived = path.with_extension("corrupt");
        match fs::rename(path, archived) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The journal itself: one document, one path, write-to-temp-then-rename
/// on every save, expiry enforced on read.
pub struct Journal<W: JournalWriter = FsJournalWriter, C: Clock = hub_core::SystemClock> {
    writer: W,
    clock: C,
    path: PathBuf,
}

impl Journal<FsJournalWriter, hub_core::SystemClock> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            writer: FsJournalWriter,
            clock: hub_core::SystemClock,
            path: path.into(),
        }
    }
}

impl<W: JournalWriter, C: Clock> Journal<W, C> {
    pub fn with_writer_and_clock(writer: W, clock: C, path: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            clock,
            path: path.into(),
        }
    }

    /// Atomically replace the journal document with `state`.
    pub fn save(&self, state: &WorkState) -> Result<(), JournalError> {
        let tmp_path = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(state)?;
        self.writer.write_tmp(&tmp_path, &bytes)?;
        self.writer.rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), "work-state journal written");
        Ok(())
    }

    /// Read the current document, if any. Expired or corrupt documents are
    /// treated as absent: an expired document is deleted, a corrupt one is
    /// archived aside.
    pub fn load(&self) -> Result<Option<WorkState>, JournalError> {
        let Some(bytes) = self.writer.read(&self.path)? else {
            return Ok(None);
        };

        let state: WorkState = match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "work-state journal corrupt, archiving");
                self.writer.archive(&self.path)?;
                return Ok(None);
            }
        };

        if state.is_expired(self.clock.now()) {
            tracing::debug!(path = %self.path.display(), "work-state journal expired, clearing");
            self.writer.remove(&self.path)?;
            return Ok(None);
        }

        Ok(Some(state))
    }

    /// Delete the journal outright (clear on full completion).
    pub fn clear(&self) -> Result<(), JournalError> {
        self.writer.remove(&self.path)
    }
}

/// Default path: `<project>/.work-state.json`, overridable by
/// `HUB_WORK_STATE_PATH`.
pub fn default_path() -> PathBuf {
    std::env::var("HUB_WORK_STATE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".work-state.json"))
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
