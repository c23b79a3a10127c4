// model2library - Centralize local AI model directories via symlinks
//
// This is the library crate containing the core business logic and data structures.
// The binary crate (main.rs) provides the CLI entry point.

pub mod cli;
pub mod config;
pub mod docgen;
pub mod expand;
pub mod logging;
pub mod models;
pub mod services;
pub mod validate;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigManager, parse_config};
pub use expand::{ExpandError, Expander, ExpansionScope, VariableTable};
pub use models::{ApplicationConfig, InstallerKind, LibraryConfig, PathPair};
pub use services::{BatchOptions, Orchestrator, ProcessResult, RollbackManager, run_batch};
pub use validate::{ValidationRules, Violation, validate};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
