use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expand::{ExpansionScope, VariableTable};

/// Recognized installer kinds. Anything else maps to `Unknown` rather than
/// aborting the parse; an unknown installer only affects reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallerKind {
    Pinokio,
    General,
    Stability,
    StabilityMatrix,
    Unknown,
}

impl InstallerKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "Pinokio" => Self::Pinokio,
            "General" => Self::General,
            "Stability" => Self::Stability,
            "StabilityMatrix" => Self::StabilityMatrix,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinokio => "Pinokio",
            Self::General => "General",
            Self::Stability => "Stability",
            Self::StabilityMatrix => "StabilityMatrix",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for InstallerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw source/target pair as written in the configuration. Both sides may
/// contain `{name}` placeholders; after expansion both must be absolute paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPair {
    pub source: String,
    pub target: String,
}

/// One application's complete path configuration.
///
/// `package` becomes the `{Package}` variable for this application only, via
/// [`ApplicationConfig::scope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationConfig {
    pub name: String,
    pub installer: InstallerKind,
    pub package: String,
    pub create_sym_links: bool,
    /// Application-local folder name mapped to a different name in the shared
    /// library; the symlink is created at the renamed location.
    pub special_folders: IndexMap<String, String>,
    /// Ordered model-directory pairs; processed before `output_pairs`.
    pub base_path_pairs: Vec<PathPair>,
    /// Ordered output-directory pairs.
    pub output_pairs: Vec<PathPair>,
}

impl ApplicationConfig {
    /// Expansion context for this application, injecting `Package` and
    /// `Installer` as scoped overrides.
    pub fn scope(&self) -> ExpansionScope {
        ExpansionScope::for_application(&self.name, &self.package, self.installer.as_str())
    }

    /// All path pairs in processing order: base paths first, then outputs.
    pub fn path_pairs(&self) -> impl Iterator<Item = &PathPair> {
        self.base_path_pairs.iter().chain(self.output_pairs.iter())
    }
}

/// Fully typed view of one configuration file: the variable table from the
/// `library_path` (and `RollBacks`) sections plus every application section in
/// declaration order.
#[derive(Debug, Clone, Default)]
pub struct LibraryConfig {
    pub variables: VariableTable,
    pub applications: IndexMap<String, ApplicationConfig>,
}

impl LibraryConfig {
    pub fn application_names(&self) -> Vec<&str> {
        self.applications.keys().map(String::as_str).collect()
    }

    pub fn application(&self, name: &str) -> Option<&ApplicationConfig> {
        self.applications.get(name)
    }
}
