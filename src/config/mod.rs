//! Configuration loading: YAML file to typed [`LibraryConfig`].
//!
//! The file is a nested mapping with a flat `library_path` section (variable
//! definitions), an optional `RollBacks` section (merged into the variable
//! table) and one application section per installed tool. The raw mapping is
//! converted into strongly typed structures immediately after parsing; any
//! malformed section is rejected with a single [`ConfigError::Shape`] before
//! expansion begins.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use thiserror::Error;

use crate::expand::VariableTable;
use crate::models::{ApplicationConfig, InstallerKind, LibraryConfig, PathPair};

/// Sections with a fixed meaning that are never treated as applications.
const SPECIAL_SECTIONS: [&str; 3] = ["library_path", "version", "RollBacks"];

/// Errors from configuration loading and shape validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {source}")]
    Yaml { source: serde_yaml_ng::Error },

    #[error("malformed section '{section}': {reason}")]
    Shape { section: String, reason: String },
}

impl ConfigError {
    fn shape(section: &str, reason: impl Into<String>) -> Self {
        Self::Shape {
            section: section.to_string(),
            reason: reason.into(),
        }
    }
}

/// Raw serde view of one application section.
#[derive(Debug, Deserialize)]
struct RawAppSection {
    #[serde(rename = "Installer")]
    installer: Option<String>,

    #[serde(rename = "Package")]
    package: Option<String>,

    #[serde(default)]
    create_sym_links: bool,

    #[serde(default)]
    special_folders: IndexMap<String, String>,

    #[serde(default)]
    base_path: Vec<PathPair>,

    #[serde(default)]
    outputs: Vec<PathPair>,
}

/// Parse a configuration document into a typed [`LibraryConfig`].
pub fn parse_config(yaml: &str) -> Result<LibraryConfig, ConfigError> {
    let document: IndexMap<String, serde_yaml_ng::Value> =
        serde_yaml_ng::from_str(yaml).map_err(|source| ConfigError::Yaml { source })?;

    let library_section = document
        .get("library_path")
        .ok_or_else(|| ConfigError::shape("library_path", "section is missing"))?;
    let mut variables: IndexMap<String, String> =
        serde_yaml_ng::from_value(library_section.clone()).map_err(|e| {
            ConfigError::shape("library_path", format!("expected flat string mapping: {e}"))
        })?;

    // Rollback locations are plain variables for expansion purposes.
    if let Some(rollbacks) = document.get("RollBacks") {
        let extra: IndexMap<String, String> = serde_yaml_ng::from_value(rollbacks.clone())
            .map_err(|e| {
                ConfigError::shape("RollBacks", format!("expected flat string mapping: {e}"))
            })?;
        variables.extend(extra);
    }

    let mut applications = IndexMap::new();
    for (section_name, value) in &document {
        if SPECIAL_SECTIONS.contains(&section_name.as_str()) {
            continue;
        }
        if !value.is_mapping() {
            tracing::debug!("Skipping non-mapping section: {}", section_name);
            continue;
        }

        let raw: RawAppSection = serde_yaml_ng::from_value(value.clone())
            .map_err(|e| ConfigError::shape(section_name, e.to_string()))?;

        let installer = raw
            .installer
            .ok_or_else(|| ConfigError::shape(section_name, "missing Installer field"))?;
        let package = raw
            .package
            .ok_or_else(|| ConfigError::shape(section_name, "missing Package field"))?;

        let installer = InstallerKind::parse(&installer);
        if installer == InstallerKind::Unknown {
            tracing::warn!("Unknown installer kind in section {}", section_name);
        }

        applications.insert(
            section_name.clone(),
            ApplicationConfig {
                name: section_name.clone(),
                installer,
                package,
                create_sym_links: raw.create_sym_links,
                special_folders: raw.special_folders,
                base_path_pairs: raw.base_path,
                output_pairs: raw.outputs,
            },
        );
    }

    Ok(LibraryConfig {
        variables: variables.into_iter().collect::<VariableTable>(),
        applications,
    })
}

/// Loads the library configuration file from disk.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    pub fn new<P: AsRef<Utf8Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Read and convert the configuration file.
    pub fn load(&self) -> Result<LibraryConfig, ConfigError> {
        let contents = fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Io {
            path: self.config_path.clone(),
            source,
        })?;

        let config = parse_config(&contents)?;
        tracing::info!(
            "Loaded config from {}: {} variables, {} applications",
            self.config_path,
            config.variables.len(),
            config.applications.len()
        );
        Ok(config)
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
