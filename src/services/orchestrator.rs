//! Symlink orchestration: the transactional move-aside + link-create protocol.
//!
//! Each application's path pairs are processed strictly in configuration
//! order. Per pair: resolve (expand + validate), classify the target, displace
//! pre-existing content under the rollback base, create the symlink. The first
//! failing step rolls back every completed step for the current application in
//! reverse order; one application's failure never aborts the batch.
//!
//! Dry-run mode performs zero filesystem mutations while still recording
//! simulated rollback entries so reporting stays consistent.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::expand::{ExpandError, Expander, ExpansionScope};
use crate::models::{AppOutcome, ApplicationConfig, BatchOutcome, LibraryConfig, StatusReport};
use crate::validate::{self, ValidationRules, Violation};

use super::fsops;
use super::rollback::{RollbackEntry, RollbackError, RollbackKind, RollbackManager};

/// Variable naming the base directory for displaced content.
pub const ROLLBACK_BASE_VAR: &str = "base_path_rollbacks";

/// Errors from orchestration steps. Expansion and validation errors abort an
/// application before any mutation; the rest trigger rollback of its
/// completed steps.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("expansion failed for {context}: {source}")]
    Expansion {
        context: String,
        #[source]
        source: ExpandError,
    },

    #[error("empty path produced for {0}")]
    EmptyPath(String),

    #[error("validation failed for {path}: {}", validate::describe(violations))]
    Validation {
        path: String,
        violations: Vec<Violation>,
    },

    #[error("path not found: {0}")]
    PathNotFound(Utf8PathBuf),

    #[error("permission denied at {path}: {source}")]
    Permission {
        path: Utf8PathBuf,
        source: io::Error,
    },

    #[error("failed to displace {from} to {to}: {source}")]
    DisplaceFailed {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        source: io::Error,
    },

    #[error("failed to create symlink {link} -> {target}: {source}")]
    LinkCreateFailed {
        link: Utf8PathBuf,
        target: Utf8PathBuf,
        source: io::Error,
    },

    #[error("inspecting {path}: {source}")]
    Inspect {
        path: Utf8PathBuf,
        source: io::Error,
    },

    #[error("rollback step failed: {0}")]
    Rollback(#[from] RollbackError),

    #[error("cancelled while processing {app}")]
    Cancelled { app: String },
}

fn io_error(path: &Utf8Path, source: io::Error) -> OperationError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        OperationError::Permission {
            path: path.to_path_buf(),
            source,
        }
    } else {
        OperationError::Inspect {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of processing one application.
#[derive(Debug)]
pub struct ProcessResult {
    pub name: String,
    pub outcome: AppOutcome,
    /// Entries that remain applied after processing. Empty when the
    /// application was skipped or rolled back.
    pub applied: Vec<RollbackEntry>,
    /// The original error plus any secondary rollback errors, in order.
    pub errors: Vec<OperationError>,
    /// Undo operations performed after a failure.
    pub rolled_back: usize,
}

/// Executes the move-aside + symlink-create protocol for one application at a
/// time, against a shared [`Expander`] and rule set.
pub struct Orchestrator<'a> {
    expander: &'a mut Expander,
    rules: ValidationRules,
    rollback_base: Utf8PathBuf,
    rollback: RollbackManager,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        expander: &'a mut Expander,
        rules: ValidationRules,
        rollback_base: Utf8PathBuf,
    ) -> Self {
        Self {
            expander,
            rules,
            rollback_base,
            rollback: RollbackManager::new(),
        }
    }

    /// Process one application: every path pair in order, with full rollback
    /// of this application's completed steps on the first failure.
    ///
    /// Re-running on an application whose symlinks are already correct
    /// performs no mutation and returns an empty `applied` list.
    pub fn process(&mut self, app: &ApplicationConfig, dry_run: bool) -> ProcessResult {
        self.process_with_cancel(app, dry_run, None)
    }

    /// Like [`Orchestrator::process`], with cooperative cancellation checked
    /// between path pairs: a cancellation request lets the current pair finish
    /// (success or rollback) before stopping.
    pub fn process_with_cancel(
        &mut self,
        app: &ApplicationConfig,
        dry_run: bool,
        cancel: Option<&AtomicBool>,
    ) -> ProcessResult {
        self.rollback.reset();

        if !app.create_sym_links {
            tracing::info!("Symlink creation is disabled for {}", app.name);
            return ProcessResult {
                name: app.name.clone(),
                outcome: AppOutcome::Skipped,
                applied: Vec::new(),
                errors: Vec::new(),
                rolled_back: 0,
            };
        }

        tracing::info!(
            "Processing {} ({} pairs){}",
            app.name,
            app.base_path_pairs.len() + app.output_pairs.len(),
            if dry_run { " (dry run)" } else { "" }
        );

        let scope = app.scope();
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let rollback_dir = self
            .rollback_base
            .join(&app.name)
            .join(format!("rollback_{stamp}"));

        let mut errors = Vec::new();
        for pair in app.path_pairs() {
            if let Err(error) = self.process_pair(app, pair, &scope, &rollback_dir, dry_run) {
                tracing::error!("{}: {} - rolling back", app.name, error);
                let rolled_back = self.rollback.len();
                let secondary = self.rollback.undo_all();
                errors.push(error);
                errors.extend(secondary.into_iter().map(OperationError::from));
                return ProcessResult {
                    name: app.name.clone(),
                    outcome: AppOutcome::RolledBack,
                    applied: Vec::new(),
                    errors,
                    rolled_back,
                };
            }

            // The pair in flight always completes; the request is observed
            // between pairs. Completed pairs are kept, not rolled back.
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::warn!("Cancellation requested; stopping before next pair");
                errors.push(OperationError::Cancelled {
                    app: app.name.clone(),
                });
                break;
            }
        }

        let applied = self.rollback.take_entries();
        let cancelled = errors
            .iter()
            .any(|e| matches!(e, OperationError::Cancelled { .. }));
        let outcome = if cancelled {
            AppOutcome::Cancelled
        } else if applied.is_empty() {
            AppOutcome::Skipped
        } else {
            AppOutcome::Ok
        };
        ProcessResult {
            name: app.name.clone(),
            outcome,
            applied,
            errors,
            rolled_back: 0,
        }
    }

    /// One path pair through the resolve / classify / displace / link steps.
    fn process_pair(
        &mut self,
        app: &ApplicationConfig,
        pair: &crate::models::PathPair,
        scope: &ExpansionScope,
        rollback_dir: &Utf8Path,
        dry_run: bool,
    ) -> Result<(), OperationError> {
        // Resolve
        let source = self.expand_side(&pair.source, &app.name, "source", scope)?;
        let target = self.expand_side(&pair.target, &app.name, "target", scope)?;

        self.check_source(&source, dry_run)?;
        self.check_target(&target)?;

        // A special-folder mapping renames the link location.
        let link_path = match target
            .file_name()
            .and_then(|name| app.special_folders.get(name))
        {
            Some(renamed) => {
                let renamed_path = target
                    .parent()
                    .map_or_else(|| Utf8PathBuf::from(renamed), |p| p.join(renamed));
                tracing::info!("Special folder: linking {} instead of {}", renamed_path, target);
                renamed_path
            }
            None => target.clone(),
        };

        // Classify target
        match fs::symlink_metadata(&link_path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Nothing to preserve
            }
            Err(e) => return Err(io_error(&link_path, e)),
            Ok(meta) if meta.file_type().is_symlink() => {
                let existing = fs::read_link(&link_path).map_err(|e| io_error(&link_path, e))?;
                if fsops::links_to(&existing, &source) {
                    tracing::info!("Symlink already correct: {} -> {}", link_path, source);
                    return Ok(());
                }
                tracing::warn!(
                    "Existing symlink points elsewhere: {} -> {}",
                    link_path,
                    existing.display()
                );
                if !dry_run {
                    fsops::remove_symlink(&link_path).map_err(|e| io_error(&link_path, e))?;
                }
            }
            Ok(meta) => {
                self.displace(&link_path, rollback_dir, meta.is_dir(), dry_run)?;
            }
        }

        self.link(&source, &link_path, dry_run)
    }

    fn expand_side(
        &mut self,
        raw: &str,
        app_name: &str,
        side: &str,
        scope: &ExpansionScope,
    ) -> Result<Utf8PathBuf, OperationError> {
        let context = format!("{app_name}.{side}");
        let expanded = self
            .expander
            .expand(raw, scope)
            .map_err(|source| OperationError::Expansion {
                context: context.clone(),
                source,
            })?;
        if expanded.is_empty() {
            return Err(OperationError::EmptyPath(context));
        }
        Ok(Utf8PathBuf::from(expanded))
    }

    /// Validate the source (library) side. A missing source is created when
    /// `create_missing` permits it; any other violation aborts the pair.
    fn check_source(&mut self, source: &Utf8Path, dry_run: bool) -> Result<(), OperationError> {
        let result = validate::validate(source.as_str(), &self.rules)
            .map_err(|_| OperationError::EmptyPath(source.to_string()))?;

        let creatable = self.rules.create_missing
            && result.violations.iter().all(|v| *v == Violation::Missing);

        if result.is_ok() {
            return Ok(());
        }
        if !creatable {
            return Err(OperationError::Validation {
                path: source.to_string(),
                violations: result.violations,
            });
        }

        if dry_run {
            tracing::info!("[dry run] Would create directory: {}", source);
        } else {
            fs::create_dir_all(source).map_err(|e| io_error(source, e))?;
            tracing::info!("Created directory: {}", source);
        }
        self.rollback.record(RollbackEntry::created(
            RollbackKind::CreatedDirectory,
            source.to_path_buf(),
            dry_run,
        ));
        Ok(())
    }

    /// Validate the target (application) side. Existence is not required here;
    /// a nonexistent target simply means there is nothing to displace.
    fn check_target(&self, target: &Utf8Path) -> Result<(), OperationError> {
        let rules = ValidationRules {
            check_existence: false,
            ..self.rules.clone()
        };
        let result = validate::validate(target.as_str(), &rules)
            .map_err(|_| OperationError::EmptyPath(target.to_string()))?;
        if !result.is_ok() {
            return Err(OperationError::Validation {
                path: target.to_string(),
                violations: result.violations,
            });
        }
        Ok(())
    }

    /// Move existing target content aside under the rollback base, recording
    /// enough information to move it back verbatim.
    fn displace(
        &mut self,
        link_path: &Utf8Path,
        rollback_dir: &Utf8Path,
        is_dir: bool,
        dry_run: bool,
    ) -> Result<(), OperationError> {
        let item = link_path.file_name().unwrap_or("displaced");
        let dest = rollback_dir.join(item);
        let kind = if is_dir {
            RollbackKind::MovedDirectory
        } else {
            RollbackKind::MovedFile
        };

        if dry_run {
            tracing::info!("[dry run] Would move {} to {}", link_path, dest);
        } else {
            fs::create_dir_all(rollback_dir).map_err(|e| io_error(rollback_dir, e))?;
            fsops::move_path(link_path, &dest).map_err(|source| OperationError::DisplaceFailed {
                from: link_path.to_path_buf(),
                to: dest.clone(),
                source,
            })?;
            tracing::info!("Displaced {} to {}", link_path, dest);
        }

        self.rollback.record(RollbackEntry::moved(
            kind,
            link_path.to_path_buf(),
            dest,
            dry_run,
        ));
        Ok(())
    }

    /// Create the symlink at `link_path` pointing to `source`, creating a
    /// missing parent only when `create_missing` permits it.
    fn link(
        &mut self,
        source: &Utf8Path,
        link_path: &Utf8Path,
        dry_run: bool,
    ) -> Result<(), OperationError> {
        let parent = link_path
            .parent()
            .ok_or_else(|| OperationError::PathNotFound(link_path.to_path_buf()))?;
        if !parent.exists() {
            if !self.rules.create_missing {
                return Err(OperationError::PathNotFound(parent.to_path_buf()));
            }
            if dry_run {
                tracing::info!("[dry run] Would create directory: {}", parent);
            } else {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
                tracing::info!("Created directory: {}", parent);
            }
            self.rollback.record(RollbackEntry::created(
                RollbackKind::CreatedDirectory,
                parent.to_path_buf(),
                dry_run,
            ));
        }

        if dry_run {
            tracing::info!("[dry run] Would create symlink: {} -> {}", link_path, source);
        } else {
            fsops::create_symlink(source, link_path).map_err(|source_err| {
                if source_err.kind() == io::ErrorKind::PermissionDenied {
                    OperationError::Permission {
                        path: link_path.to_path_buf(),
                        source: source_err,
                    }
                } else {
                    OperationError::LinkCreateFailed {
                        link: link_path.to_path_buf(),
                        target: source.to_path_buf(),
                        source: source_err,
                    }
                }
            })?;
            tracing::info!("Created symlink: {} -> {}", link_path, source);
        }

        self.rollback.record(RollbackEntry::created(
            RollbackKind::CreatedSymlink,
            link_path.to_path_buf(),
            dry_run,
        ));
        Ok(())
    }
}

/// Options for a batch run over every application in a configuration.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub dry_run: bool,
    pub rules: ValidationRules,
}

/// Result of a batch run: per-application results plus aggregate counts.
#[derive(Debug)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub results: Vec<ProcessResult>,
    pub status: StatusReport,
    /// Set when the run failed before any application was processed.
    pub fatal: Option<OperationError>,
}

/// Process every application in configuration order, one at a time.
///
/// The rollback base directory is resolved from the `base_path_rollbacks`
/// variable up front; failure to resolve it is a hard failure before any
/// application runs. Cancellation takes effect between path pairs only: the
/// pair in flight completes, its work is kept, and the batch stops after the
/// application that observed the request, with every result produced so far
/// still reported.
pub fn run_batch(
    config: &LibraryConfig,
    expander: &mut Expander,
    options: &BatchOptions,
    cancel: Option<&AtomicBool>,
) -> BatchReport {
    let rollback_base = match expander.expand(
        &format!("{{{ROLLBACK_BASE_VAR}}}"),
        &ExpansionScope::global(),
    ) {
        Ok(path) => Utf8PathBuf::from(path),
        Err(source) => {
            return BatchReport {
                outcome: BatchOutcome::HardFailure,
                results: Vec::new(),
                status: StatusReport::default(),
                fatal: Some(OperationError::Expansion {
                    context: ROLLBACK_BASE_VAR.to_string(),
                    source,
                }),
            };
        }
    };

    let mut orchestrator = Orchestrator::new(expander, options.rules.clone(), rollback_base);
    let mut results = Vec::new();
    let mut status = StatusReport::default();

    for app in config.applications.values() {
        let result = orchestrator.process_with_cancel(app, options.dry_run, cancel);
        match result.outcome {
            AppOutcome::Ok => status.applications_processed += 1,
            AppOutcome::RolledBack => status.applications_failed += 1,
            AppOutcome::Skipped => status.applications_skipped += 1,
            AppOutcome::Cancelled => status.applications_cancelled += 1,
        }
        status.entries_applied += result.applied.len();
        status.rollbacks_performed += result.rolled_back;
        let cancelled = result.outcome == AppOutcome::Cancelled;
        results.push(result);
        if cancelled {
            tracing::warn!("Batch cancelled; remaining applications not processed");
            break;
        }
    }

    let outcome = if status.applications_failed > 0 {
        BatchOutcome::Partial
    } else {
        BatchOutcome::Success
    };
    tracing::info!("Batch complete: {}", status.summary());

    BatchReport {
        outcome,
        results,
        status,
        fatal: None,
    }
}
