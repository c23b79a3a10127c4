//! Data models for the model2library core.
//!
//! - [`LibraryConfig`]: the fully typed view of one configuration file, built
//!   by [`ConfigManager`](crate::config::ConfigManager) from the parsed YAML
//!   mapping
//! - [`ApplicationConfig`]: one application's installer kind, package id,
//!   symlink flag, special-folder renames and ordered path pairs
//! - [`PathPair`]: a raw source/target pair, pre-expansion
//! - Report types ([`StatusReport`], [`BatchOutcome`], [`AppOutcome`]) for the
//!   per-application and per-batch outcomes surfaced to the CLI
//!
//! All structures are constructed once per run and never mutated after
//! validation.

pub mod config;
pub mod report;

pub use config::{ApplicationConfig, InstallerKind, LibraryConfig, PathPair};
pub use report::{AppOutcome, BatchOutcome, StatusReport};
