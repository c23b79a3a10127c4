//! Markdown documentation report for a loaded configuration.
//!
//! Renders the variable table (raw and resolved values), the variable usage
//! analysis, and every application's path pairs in both raw and resolved form.
//! A value that fails to resolve is rendered inline with its error, so one
//! broken variable never blocks documenting the rest of the file.

use camino::Utf8Path;
use std::fs;
use std::io;

use crate::expand::{Expander, ExpansionScope};
use crate::models::{ApplicationConfig, LibraryConfig, PathPair};
use crate::validate::ValidationRules;

/// Render one raw string through the expander, folding errors into the output.
fn resolved(expander: &mut Expander, raw: &str, scope: &ExpansionScope) -> String {
    match expander.expand(raw, scope) {
        Ok(value) => value,
        Err(e) => format!("<unresolved: {e}>"),
    }
}

fn push_pair_block(
    lines: &mut Vec<String>,
    expander: &mut Expander,
    pair: &PathPair,
    scope: &ExpansionScope,
) {
    let source = resolved(expander, &pair.source, scope);
    let target = resolved(expander, &pair.target, scope);
    lines.push("```".to_string());
    lines.push(format!("Source: {}", pair.source));
    lines.push(format!("     -> {source}"));
    lines.push(format!("Target: {}", pair.target));
    lines.push(format!("     -> {target}"));
    lines.push("```".to_string());
}

fn push_application(
    lines: &mut Vec<String>,
    expander: &mut Expander,
    app: &ApplicationConfig,
) {
    let scope = app.scope();
    lines.push(format!("### {}", app.name));
    lines.push(format!("* Installer: `{}`", app.installer));
    lines.push(format!("* Package: `{}`", app.package));
    lines.push(format!("* Create Symlinks: `{}`", app.create_sym_links));
    if !app.special_folders.is_empty() {
        lines.push(String::new());
        lines.push("Special Folders:".to_string());
        for (original, renamed) in &app.special_folders {
            lines.push(format!("* `{original}` -> `{renamed}`"));
        }
    }

    let sections = [
        ("Base Paths", &app.base_path_pairs),
        ("Outputs", &app.output_pairs),
    ];
    for (title, pairs) in sections {
        if pairs.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("#### {title}"));
        for pair in pairs.iter() {
            push_pair_block(lines, expander, pair, &scope);
        }
    }
    lines.push(String::new());
}

/// Generate a markdown report documenting `config`: validation rules, the
/// variable table with resolved values, usage analysis, and every
/// application's raw and resolved path pairs.
pub fn generate_documentation(
    expander: &mut Expander,
    config: &LibraryConfig,
    config_path: &Utf8Path,
    rules: &ValidationRules,
) -> String {
    let mut lines = vec![
        "# Configuration Documentation".to_string(),
        String::new(),
        format!("Generated at: {}", chrono::Local::now().format("%Y-%m-%dT%H:%M:%S")),
        format!("Configuration file: `{config_path}`"),
        String::new(),
        "## Validation Rules".to_string(),
        format!("* require_absolute: `{}`", rules.require_absolute),
        format!("* max_path_length: `{}`", rules.max_path_length),
        format!("* validate_drives: `{}`", rules.validate_drives),
        format!("* detect_cycles: `{}`", rules.detect_cycles),
        format!("* check_existence: `{}`", rules.check_existence),
        format!("* create_missing: `{}`", rules.create_missing),
        String::new(),
        "## Variables".to_string(),
    ];

    let global = ExpansionScope::global();
    let variables: Vec<(String, String)> = config
        .variables
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for (name, raw) in &variables {
        let value = resolved(expander, raw, &global);
        if value == *raw {
            lines.push(format!("* `{name}` = `{raw}`"));
        } else {
            lines.push(format!("* `{name}` = `{raw}` -> `{value}`"));
        }
    }

    let usage = expander.analyze_variable_usage(&config.applications);
    lines.push(String::new());
    lines.push("### Variable Usage".to_string());
    lines.push(format!("* Used variables: {}", usage.used.len()));
    lines.push(format!("* Unused variables: {}", usage.unused.len()));
    lines.push(format!("* Missing variables: {}", usage.missing.len()));
    if !usage.usage_locations.is_empty() {
        lines.push(String::new());
        lines.push("#### Usage Locations".to_string());
        for (name, locations) in &usage.usage_locations {
            lines.push(format!("* `{name}`:"));
            for location in locations {
                lines.push(format!("  * {location}"));
            }
        }
    }

    lines.push(String::new());
    lines.push("## Applications".to_string());
    for app in config.applications.values() {
        push_application(&mut lines, expander, app);
    }

    let mut doc = lines.join("\n");
    doc.push('\n');
    doc
}

/// Write a generated report to disk.
pub fn export_documentation(path: &Utf8Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents)?;
    tracing::info!("Documentation exported to {}", path);
    Ok(())
}
