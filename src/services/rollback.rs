//! Append-only log of completed reversible operations, with strict
//! reverse-order undo.
//!
//! The manager is scoped to one application's run: [`RollbackManager::reset`]
//! is called at the start of each application and entries are never shared
//! across applications. Undo is best effort; a failing undo step is reported
//! as a secondary error and does not stop the remaining steps.

use camino::Utf8PathBuf;
use thiserror::Error;

use super::fsops;

/// What a completed step did, and therefore how to undo it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackKind {
    MovedDirectory,
    MovedFile,
    CreatedSymlink,
    CreatedDirectory,
}

impl std::fmt::Display for RollbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RollbackKind::MovedDirectory => "moved-directory",
            RollbackKind::MovedFile => "moved-file",
            RollbackKind::CreatedSymlink => "created-symlink",
            RollbackKind::CreatedDirectory => "created-directory",
        };
        f.write_str(name)
    }
}

/// One completed reversible operation. Recorded the instant a step succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackEntry {
    pub kind: RollbackKind,
    /// Where the affected content originally lived.
    pub original_location: Utf8PathBuf,
    /// Where displaced content was relocated, for moved entries.
    pub rollback_location: Option<Utf8PathBuf>,
    /// The symlink or directory actually created, if any.
    pub created_path: Option<Utf8PathBuf>,
    /// Dry-run entries describe intent only and are skipped by undo.
    pub simulated: bool,
}

impl RollbackEntry {
    pub fn moved(
        kind: RollbackKind,
        original: Utf8PathBuf,
        rollback_location: Utf8PathBuf,
        simulated: bool,
    ) -> Self {
        Self {
            kind,
            original_location: original,
            rollback_location: Some(rollback_location),
            created_path: None,
            simulated,
        }
    }

    pub fn created(kind: RollbackKind, created_path: Utf8PathBuf, simulated: bool) -> Self {
        Self {
            kind,
            original_location: created_path.clone(),
            rollback_location: None,
            created_path: Some(created_path),
            simulated,
        }
    }
}

/// An undo step that itself failed.
#[derive(Error, Debug)]
pub enum RollbackError {
    #[error("failed to restore {location} from {rollback_location}: {source}")]
    RestoreFailed {
        location: Utf8PathBuf,
        rollback_location: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove created path {location}: {source}")]
    RemoveFailed {
        location: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("rollback entry for {location} is missing its rollback location")]
    IncompleteEntry { location: Utf8PathBuf },
}

/// Last-in-first-out log of completed steps for the current application.
#[derive(Debug, Default)]
pub struct RollbackManager {
    entries: Vec<RollbackEntry>,
}

impl RollbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: RollbackEntry) {
        tracing::debug!(
            "Recorded {} entry for {}{}",
            entry.kind,
            entry.original_location,
            if entry.simulated { " (simulated)" } else { "" }
        );
        self.entries.push(entry);
    }

    /// Clear the log; called at the start of each application's processing.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[RollbackEntry] {
        &self.entries
    }

    /// Drain the log, handing ownership of the entries to the caller.
    pub fn take_entries(&mut self) -> Vec<RollbackEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Undo every recorded entry in strict reverse insertion order.
    ///
    /// Simulated entries are skipped. Failures are collected and returned;
    /// they never abort the remaining undo steps.
    pub fn undo_all(&mut self) -> Vec<RollbackError> {
        let mut errors = Vec::new();

        while let Some(entry) = self.entries.pop() {
            if entry.simulated {
                continue;
            }
            match entry.kind {
                RollbackKind::MovedDirectory | RollbackKind::MovedFile => {
                    let Some(rollback_location) = entry.rollback_location else {
                        errors.push(RollbackError::IncompleteEntry {
                            location: entry.original_location,
                        });
                        continue;
                    };
                    tracing::info!(
                        "Rolling back: moving {} back to {}",
                        rollback_location,
                        entry.original_location
                    );
                    if let Err(source) =
                        fsops::move_path(&rollback_location, &entry.original_location)
                    {
                        errors.push(RollbackError::RestoreFailed {
                            location: entry.original_location,
                            rollback_location,
                            source,
                        });
                    }
                }
                RollbackKind::CreatedSymlink => {
                    let location = entry.created_path.unwrap_or(entry.original_location);
                    tracing::info!("Rolling back: removing symlink {}", location);
                    if let Err(source) = fsops::remove_symlink(&location) {
                        errors.push(RollbackError::RemoveFailed { location, source });
                    }
                }
                RollbackKind::CreatedDirectory => {
                    let location = entry.created_path.unwrap_or(entry.original_location);
                    tracing::info!("Rolling back: removing directory {}", location);
                    // Only empty directories are removed; displaced content is
                    // restored by earlier (later-popped) move entries.
                    if let Err(source) = std::fs::remove_dir(&location) {
                        errors.push(RollbackError::RemoveFailed { location, source });
                    }
                }
            }
        }

        errors
    }
}
