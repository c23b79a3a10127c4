//! Services module - the symlink orchestration engine.
//!
//! This module contains the filesystem-mutating core of model2library. The
//! services are **framework-agnostic**: no CLI or GUI dependencies, all inputs
//! are explicit parameters, which keeps them testable against temporary
//! directories.
//!
//! # Components
//!
//! - [`Orchestrator`]: executes the move-aside + symlink-create protocol for
//!   one application at a time:
//!   - expanding and validating both sides of every path pair before any
//!     destructive operation
//!   - classifying the target (nothing there / correct link / stale link /
//!     real content to preserve)
//!   - displacing existing content under the rollback base
//!   - creating the symlink, honoring `special_folders` renames
//!
//! - [`RollbackManager`]: append-only log of completed reversible operations,
//!   undone in strict reverse order when a later step fails. Rollback is best
//!   effort: a failing undo step is reported and skipped, never fatal to the
//!   remaining steps.
//!
//! - [`run_batch`]: sequential driver over every application in a
//!   configuration, with per-application isolation and cooperative
//!   cancellation between path pairs.
//!
//! # Failure policy
//!
//! Any step failing for a path pair rolls back every completed step for the
//! *current application*, marks it failed, and moves on to the next
//! application. The original error and any secondary rollback errors are both
//! surfaced; nothing is retried automatically.

pub mod fsops;
pub mod orchestrator;
pub mod rollback;

pub use orchestrator::{
    BatchOptions, BatchReport, OperationError, Orchestrator, ProcessResult, run_batch,
    ROLLBACK_BASE_VAR,
};
pub use rollback::{RollbackEntry, RollbackError, RollbackKind, RollbackManager};
