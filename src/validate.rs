//! Path validation against a configurable rule set.
//!
//! Invalidity is a normal, inspectable result ([`ValidationResult`]), never an
//! error: a path can carry several simultaneous violations and all of them are
//! reported. The only hard error is malformed input (an empty string where a
//! path was required).
//!
//! Configuration files are authored with Windows paths, so the absolute-path
//! and drive checks recognize both Unix roots and `X:\` drive prefixes.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Safety bound for symlink chain resolution; a longer chain is treated as a
/// cycle.
pub const MAX_SYMLINK_HOPS: usize = 64;

/// Rule set applied to every resolved path before orchestration touches it.
///
/// `create_missing` does not change validation output; it permits the
/// orchestrator to create a missing directory instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub require_absolute: bool,
    pub max_path_length: usize,
    pub validate_drives: bool,
    pub detect_cycles: bool,
    pub check_existence: bool,
    pub create_missing: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            require_absolute: true,
            max_path_length: 260,
            validate_drives: true,
            detect_cycles: true,
            check_existence: true,
            create_missing: true,
        }
    }
}

/// Hard errors from the validator. Path invalidity is not an error; see
/// [`ValidationResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidateError {
    #[error("empty string where a path was required")]
    EmptyPath,
}

/// A single rule violation. Violations are additive; see
/// [`ValidationResult::violations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NotAbsolute,
    TooLong { length: usize, max: usize },
    InvalidDrive { drive: String },
    Missing,
    CyclicSymlink { hops: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotAbsolute => write!(f, "path is not absolute"),
            Violation::TooLong { length, max } => {
                write!(f, "path exceeds maximum length of {max} characters ({length})")
            }
            Violation::InvalidDrive { drive } => write!(f, "drive '{drive}' is not valid"),
            Violation::Missing => write!(f, "path does not exist"),
            Violation::CyclicSymlink { hops } => {
                write!(f, "symlink chain is cyclic (after {hops} hops)")
            }
        }
    }
}

/// Outcome of validating one path: the path plus every violation found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub path: Utf8PathBuf,
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Render a violation list for error messages.
pub fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a resolved path against `rules`, reporting every violation.
pub fn validate(path: &str, rules: &ValidationRules) -> Result<ValidationResult, ValidateError> {
    if path.is_empty() {
        return Err(ValidateError::EmptyPath);
    }

    let mut violations = Vec::new();

    if rules.require_absolute && !is_absolute_path(path) {
        violations.push(Violation::NotAbsolute);
    }

    if path.len() > rules.max_path_length {
        violations.push(Violation::TooLong {
            length: path.len(),
            max: rules.max_path_length,
        });
    }

    if rules.validate_drives {
        if let Some(violation) = check_drive(path) {
            violations.push(violation);
        }
    }

    if rules.check_existence && fs::symlink_metadata(path).is_err() {
        violations.push(Violation::Missing);
    }

    if rules.detect_cycles {
        if let Some(hops) = symlink_chain_cycle(Utf8Path::new(path)) {
            violations.push(Violation::CyclicSymlink { hops });
        }
    }

    Ok(ValidationResult {
        path: Utf8PathBuf::from(path),
        violations,
    })
}

/// Absolute-path check that accepts Unix roots, Windows drive prefixes and UNC
/// paths regardless of the host platform.
pub fn is_absolute_path(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with(r"\\") {
        return true;
    }
    has_drive_prefix(path)
        && path[2..]
            .chars()
            .next()
            .is_some_and(|c| c == '\\' || c == '/')
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':'
}

/// Drive-letter validity. On Windows the drive root must actually exist; on
/// other hosts only the letter itself is checked.
fn check_drive(path: &str) -> Option<Violation> {
    if !has_drive_prefix(path) {
        return None;
    }
    let letter = path.chars().next()?;
    let drive = format!("{}:", letter.to_ascii_uppercase());
    if !letter.is_ascii_alphabetic() {
        return Some(Violation::InvalidDrive { drive });
    }
    #[cfg(windows)]
    {
        let root = format!("{drive}\\");
        if !std::path::Path::new(&root).exists() {
            return Some(Violation::InvalidDrive { drive });
        }
    }
    None
}

/// Walk the symlink chain starting at `path`. Returns the hop count when a
/// previously visited path reappears or the safety bound is exceeded, `None`
/// when the chain reaches a non-symlink terminus.
fn symlink_chain_cycle(path: &Utf8Path) -> Option<usize> {
    let mut current = PathBuf::from(path.as_std_path());
    let mut visited: HashSet<PathBuf> = HashSet::new();
    visited.insert(current.clone());
    let mut hops = 0;

    loop {
        let meta = fs::symlink_metadata(&current).ok()?;
        if !meta.file_type().is_symlink() {
            return None;
        }
        hops += 1;
        if hops > MAX_SYMLINK_HOPS {
            return Some(hops);
        }
        let link = fs::read_link(&current).ok()?;
        let next = if link.is_absolute() {
            link
        } else {
            current.parent().map_or(link.clone(), |p| p.join(&link))
        };
        if !visited.insert(next.clone()) {
            return Some(hops);
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_fs_rules() -> ValidationRules {
        ValidationRules {
            check_existence: false,
            detect_cycles: false,
            ..ValidationRules::default()
        }
    }

    #[test]
    fn test_empty_path_is_hard_error() {
        assert_eq!(
            validate("", &ValidationRules::default()).unwrap_err(),
            ValidateError::EmptyPath
        );
    }

    #[test]
    fn test_absolute_path_styles() {
        assert!(is_absolute_path("/usr/share/models"));
        assert!(is_absolute_path(r"D:\AI\models"));
        assert!(is_absolute_path("D:/AI/models"));
        assert!(is_absolute_path(r"\\server\share"));
        assert!(!is_absolute_path("models"));
        assert!(!is_absolute_path(r"AI\models"));
    }

    #[test]
    fn test_relative_path_flagged() {
        let result = validate("relative/path", &no_fs_rules()).unwrap();
        assert_eq!(result.violations, vec![Violation::NotAbsolute]);
    }

    #[test]
    fn test_violations_are_additive() {
        let long_relative = "a/".repeat(150);
        assert_eq!(long_relative.len(), 300);
        let result = validate(&long_relative, &no_fs_rules()).unwrap();
        assert_eq!(
            result.violations,
            vec![
                Violation::NotAbsolute,
                Violation::TooLong {
                    length: 300,
                    max: 260
                }
            ]
        );
    }

    #[test]
    fn test_invalid_drive_letter() {
        let result = validate(r"1:\oops", &no_fs_rules()).unwrap();
        assert!(result
            .violations
            .contains(&Violation::InvalidDrive { drive: "1:".into() }));
    }

    #[test]
    fn test_missing_path_flagged() {
        let rules = ValidationRules {
            require_absolute: false,
            validate_drives: false,
            ..ValidationRules::default()
        };
        let result = validate("definitely/not/on/disk", &rules).unwrap();
        assert_eq!(result.violations, vec![Violation::Missing]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_detected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::os::unix::fs::symlink(&b, &a).unwrap();
        std::os::unix::fs::symlink(&a, &b).unwrap();

        let rules = ValidationRules {
            require_absolute: false,
            validate_drives: false,
            check_existence: false,
            ..ValidationRules::default()
        };
        let result = validate(a.to_str().unwrap(), &rules).unwrap();
        assert!(matches!(
            result.violations.as_slice(),
            [Violation::CyclicSymlink { .. }]
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_directory_passes() {
        let dir = tempfile::tempdir().unwrap();
        let rules = ValidationRules {
            validate_drives: false,
            ..ValidationRules::default()
        };
        let result = validate(dir.path().to_str().unwrap(), &rules).unwrap();
        assert!(result.is_ok());
    }
}
