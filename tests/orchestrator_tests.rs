//! Integration tests for the symlink orchestrator
//!
//! These tests verify against real temporary directories:
//! - Displacement of existing target content and symlink creation
//! - Idempotent re-runs (no mutation, empty applied list)
//! - Full rollback when a later path pair fails
//! - Dry-run purity (zero filesystem mutation)
//! - Special-folder renames and stale-symlink replacement

#![cfg(unix)]

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use model2library::expand::{Expander, VariableTable};
use model2library::models::{AppOutcome, ApplicationConfig, BatchOutcome, InstallerKind, PathPair};
use model2library::services::rollback::RollbackKind;
use model2library::services::{BatchOptions, OperationError, Orchestrator, run_batch};
use model2library::validate::ValidationRules;
use model2library::LibraryConfig;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

struct Fixture {
    _guard: TempDir,
    root: Utf8PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let guard = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(guard.path().to_path_buf()).unwrap();
        Self {
            _guard: guard,
            root,
        }
    }

    fn rollback_base(&self) -> Utf8PathBuf {
        self.root.join("rollbacks")
    }

    fn expander(&self) -> Expander {
        let mut table = VariableTable::new();
        table.insert("base_path_rollbacks", self.rollback_base().as_str());
        Expander::new(table)
    }
}

fn app(name: &str, pairs: Vec<PathPair>) -> ApplicationConfig {
    ApplicationConfig {
        name: name.to_string(),
        installer: InstallerKind::General,
        package: name.to_lowercase(),
        create_sym_links: true,
        special_folders: IndexMap::new(),
        base_path_pairs: pairs,
        output_pairs: Vec::new(),
    }
}

fn pair(source: &Utf8Path, target: &Utf8Path) -> PathPair {
    PathPair {
        source: source.to_string(),
        target: target.to_string(),
    }
}

fn rules() -> ValidationRules {
    ValidationRules {
        max_path_length: 4096,
        ..ValidationRules::default()
    }
}

/// Recursive listing of relative paths and file contents, for byte-for-byte
/// snapshot comparison.
fn snapshot(root: &Utf8Path) -> Vec<(String, Option<Vec<u8>>)> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in dir.read_dir_utf8().unwrap() {
            let entry = entry.unwrap();
            let rel = entry.path().strip_prefix(root).unwrap().to_string();
            if entry.file_type().unwrap().is_dir() {
                entries.push((rel, None));
                stack.push(entry.path().to_path_buf());
            } else {
                entries.push((rel, Some(fs::read(entry.path()).unwrap())));
            }
        }
    }
    entries.sort();
    entries
}

#[test]
fn test_displaces_content_and_creates_symlink() {
    let fx = Fixture::new();
    let source = fx.root.join("library/models");
    let target = fx.root.join("app/models");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("file.bin"), b"weights").unwrap();

    let mut expander = fx.expander();
    let mut orchestrator = Orchestrator::new(&mut expander, rules(), fx.rollback_base());
    let application = app("TestApp", vec![pair(&source, &target)]);

    let result = orchestrator.process(&application, false);
    assert_eq!(result.outcome, AppOutcome::Ok);
    assert!(result.errors.is_empty());
    assert_eq!(result.applied.len(), 2); // moved-directory + created-symlink

    // Target is now a symlink to the library
    let meta = fs::symlink_metadata(&target).unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(
        fs::read_link(&target).unwrap(),
        source.as_std_path().to_path_buf()
    );

    // Displaced content lives under the rollback base
    let displaced = &result.applied[0];
    assert_eq!(displaced.kind, RollbackKind::MovedDirectory);
    let rollback_location = displaced.rollback_location.as_ref().unwrap();
    assert!(rollback_location.join("file.bin").exists());
    assert!(rollback_location.starts_with(fx.rollback_base()));

    // Second run is a no-op
    let again = orchestrator.process(&application, false);
    assert_eq!(again.outcome, AppOutcome::Skipped);
    assert!(again.applied.is_empty());
}

#[test]
fn test_second_pair_failure_rolls_back_first() {
    let fx = Fixture::new();
    let source_a = fx.root.join("library/a");
    let target_a = fx.root.join("app/a");
    fs::create_dir_all(&source_a).unwrap();
    fs::create_dir_all(&target_a).unwrap();
    fs::write(target_a.join("file.bin"), b"keep me").unwrap();

    // Second pair's link parent does not exist; with create_missing off the
    // link step must fail.
    let source_b = fx.root.join("library/b");
    let target_b = fx.root.join("missing-parent/sub/b");
    fs::create_dir_all(&source_b).unwrap();

    let strict = ValidationRules {
        create_missing: false,
        ..rules()
    };
    let mut expander = fx.expander();
    let mut orchestrator = Orchestrator::new(&mut expander, strict, fx.rollback_base());
    let application = app(
        "TwoPairs",
        vec![pair(&source_a, &target_a), pair(&source_b, &target_b)],
    );

    let result = orchestrator.process(&application, false);
    assert_eq!(result.outcome, AppOutcome::RolledBack);
    assert!(result.applied.is_empty());
    assert!(result.rolled_back > 0);
    assert!(!result.errors.is_empty());

    // First pair's displaced content is back in place; no dangling symlink
    let meta = fs::symlink_metadata(&target_a).unwrap();
    assert!(meta.is_dir());
    assert!(!meta.file_type().is_symlink());
    assert_eq!(fs::read(target_a.join("file.bin")).unwrap(), b"keep me");
}

#[test]
fn test_dry_run_leaves_filesystem_untouched() {
    let fx = Fixture::new();
    let source = fx.root.join("library/models");
    let target = fx.root.join("app/models");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("file.bin"), b"weights").unwrap();

    let before = snapshot(&fx.root);

    let mut expander = fx.expander();
    let mut orchestrator = Orchestrator::new(&mut expander, rules(), fx.rollback_base());
    let application = app("DryRun", vec![pair(&source, &target)]);

    let result = orchestrator.process(&application, true);
    assert_eq!(result.outcome, AppOutcome::Ok);
    assert!(!result.applied.is_empty());
    assert!(result.applied.iter().all(|entry| entry.simulated));

    assert_eq!(snapshot(&fx.root), before);
}

#[test]
fn test_stale_symlink_is_replaced() {
    let fx = Fixture::new();
    let source = fx.root.join("library/models");
    let elsewhere = fx.root.join("library/old");
    let target = fx.root.join("app/models");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&elsewhere).unwrap();
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(&elsewhere, &target).unwrap();

    let mut expander = fx.expander();
    let mut orchestrator = Orchestrator::new(&mut expander, rules(), fx.rollback_base());
    let application = app("Stale", vec![pair(&source, &target)]);

    let result = orchestrator.process(&application, false);
    assert_eq!(result.outcome, AppOutcome::Ok);
    assert_eq!(
        fs::read_link(&target).unwrap(),
        source.as_std_path().to_path_buf()
    );
}

#[test]
fn test_special_folder_renames_link_location() {
    let fx = Fixture::new();
    let source = fx.root.join("library/StableDiffusion");
    let target = fx.root.join("app/checkpoints");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(target.parent().unwrap()).unwrap();

    let mut application = app("Special", vec![pair(&source, &target)]);
    application
        .special_folders
        .insert("checkpoints".to_string(), "sd-checkpoints".to_string());

    let mut expander = fx.expander();
    let mut orchestrator = Orchestrator::new(&mut expander, rules(), fx.rollback_base());
    let result = orchestrator.process(&application, false);

    assert_eq!(result.outcome, AppOutcome::Ok);
    let renamed = fx.root.join("app/sd-checkpoints");
    assert!(fs::symlink_metadata(&renamed).unwrap().file_type().is_symlink());
    assert!(fs::symlink_metadata(&target).is_err());
}

#[test]
fn test_missing_source_created_when_permitted() {
    let fx = Fixture::new();
    let source = fx.root.join("library/new-models");
    let target = fx.root.join("app/models");
    fs::create_dir_all(target.parent().unwrap()).unwrap();

    let mut expander = fx.expander();
    let mut orchestrator = Orchestrator::new(&mut expander, rules(), fx.rollback_base());
    let result = orchestrator.process(&app("FreshLib", vec![pair(&source, &target)]), false);

    assert_eq!(result.outcome, AppOutcome::Ok);
    assert!(source.is_dir());
    assert!(result
        .applied
        .iter()
        .any(|e| e.kind == RollbackKind::CreatedDirectory));
}

#[test]
fn test_cancellation_keeps_completed_pair_and_stops() {
    let fx = Fixture::new();
    let source_a = fx.root.join("library/a");
    let target_a = fx.root.join("app/a");
    fs::create_dir_all(&source_a).unwrap();
    fs::create_dir_all(&target_a).unwrap();
    fs::write(target_a.join("file.bin"), b"weights").unwrap();

    let source_b = fx.root.join("library/b");
    let target_b = fx.root.join("app/b");
    fs::create_dir_all(&source_b).unwrap();

    let cancel = AtomicBool::new(false);
    cancel.store(true, Ordering::Relaxed);

    let mut expander = fx.expander();
    let mut orchestrator = Orchestrator::new(&mut expander, rules(), fx.rollback_base());
    let application = app(
        "Interrupted",
        vec![pair(&source_a, &target_a), pair(&source_b, &target_b)],
    );

    let result = orchestrator.process_with_cancel(&application, false, Some(&cancel));

    // The pair in flight finished and its work is kept, not rolled back
    assert_eq!(result.outcome, AppOutcome::Cancelled);
    assert_eq!(result.rolled_back, 0);
    assert_eq!(result.applied.len(), 2); // moved-directory + created-symlink
    assert!(fs::symlink_metadata(&target_a).unwrap().file_type().is_symlink());

    // The second pair never ran
    assert!(fs::symlink_metadata(&target_b).is_err());
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, OperationError::Cancelled { .. })));
}

#[test]
fn test_batch_stops_after_cancelled_application() {
    let fx = Fixture::new();
    let source_a = fx.root.join("library/alpha");
    let target_a = fx.root.join("apps/alpha/models");
    fs::create_dir_all(&source_a).unwrap();
    fs::create_dir_all(target_a.parent().unwrap()).unwrap();

    let source_b = fx.root.join("library/beta");
    let target_b = fx.root.join("apps/beta/models");
    fs::create_dir_all(&source_b).unwrap();
    fs::create_dir_all(target_b.parent().unwrap()).unwrap();

    let mut table = VariableTable::new();
    table.insert("base_path_rollbacks", fx.rollback_base().as_str());
    let mut config = LibraryConfig {
        variables: table.clone(),
        applications: IndexMap::new(),
    };
    config
        .applications
        .insert("Alpha".into(), app("Alpha", vec![pair(&source_a, &target_a)]));
    config
        .applications
        .insert("Beta".into(), app("Beta", vec![pair(&source_b, &target_b)]));

    let cancel = AtomicBool::new(true);
    let mut expander = Expander::new(table);
    let options = BatchOptions {
        dry_run: false,
        rules: rules(),
    };
    let report = run_batch(&config, &mut expander, &options, Some(&cancel));

    // Alpha's result is reported with its completed work; Beta never ran
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome, AppOutcome::Cancelled);
    assert_eq!(report.status.applications_cancelled, 1);
    assert!(fs::symlink_metadata(&target_a).unwrap().file_type().is_symlink());
    assert!(fs::symlink_metadata(&target_b).is_err());
    assert_eq!(report.outcome, BatchOutcome::Success);
}

#[test]
fn test_batch_isolates_failures() {
    let fx = Fixture::new();

    // Good application
    let source_ok = fx.root.join("library/good");
    let target_ok = fx.root.join("apps/good/models");
    fs::create_dir_all(&source_ok).unwrap();
    fs::create_dir_all(target_ok.parent().unwrap()).unwrap();

    // Bad application: relative source fails validation
    let bad = ApplicationConfig {
        base_path_pairs: vec![PathPair {
            source: "relative/library".to_string(),
            target: fx.root.join("apps/bad/models").to_string(),
        }],
        ..app("Bad", Vec::new())
    };

    let mut config = LibraryConfig::default();
    let mut table = VariableTable::new();
    table.insert("base_path_rollbacks", fx.rollback_base().as_str());
    config.variables = table.clone();
    config
        .applications
        .insert("Good".into(), app("Good", vec![pair(&source_ok, &target_ok)]));
    config.applications.insert("Bad".into(), bad);

    let mut expander = Expander::new(table);
    let options = BatchOptions {
        dry_run: false,
        rules: rules(),
    };
    let report = run_batch(&config, &mut expander, &options, None);

    assert_eq!(report.outcome, BatchOutcome::Partial);
    assert_eq!(report.status.applications_processed, 1);
    assert_eq!(report.status.applications_failed, 1);
    assert_eq!(report.results.len(), 2);

    // The good application still got its symlink
    assert!(fs::symlink_metadata(&target_ok)
        .unwrap()
        .file_type()
        .is_symlink());
}
