//! model2library - Centralize local AI model directories via symlinks
//!
//! Main entry point for the command-line application.
//!
//! # Execution Flow
//!
//! 1. Parse CLI arguments
//! 2. Initialize logging -> logs/model2library.<date>
//! 3. Load and type-check the YAML configuration (hard failure, exit 2)
//! 4. Optionally print variable usage analysis, or write the configuration
//!    documentation report, and exit
//! 5. Run the batch: one application at a time, each isolated by the
//!    rollback manager
//! 6. Report per-application outcomes and exit 0 (all ok), 1 (some
//!    applications rolled back) or 2 (configuration failure)

use anyhow::Result;
use clap::Parser;
use model2library::cli::Cli;
use model2library::models::BatchOutcome;
use model2library::services::{BatchOptions, run_batch};
use model2library::{APP_NAME, ConfigManager, Expander, LibraryConfig, VERSION};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let guard = model2library::logging::setup_logging(&cli.log_dir, APP_NAME, cli.verbose, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let code = run(&cli);

    // Flush the rotating file appender before exiting.
    drop(guard);
    std::process::exit(code);
}

fn run(cli: &Cli) -> i32 {
    let config_manager = ConfigManager::new(&cli.config);
    let config = match config_manager.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Unable to load configuration {}: {}", cli.config, e);
            eprintln!("Error: unable to load configuration: {e}");
            return BatchOutcome::HardFailure.exit_code();
        }
    };

    let mut expander = Expander::new(config.variables.clone());

    if cli.analyze_variables {
        let usage = expander.analyze_variable_usage(&config.applications);
        println!("Used variables:    {}", usage.used.join(", "));
        println!("Unused variables:  {}", usage.unused.join(", "));
        println!("Missing variables: {}", usage.missing.join(", "));
        for (name, locations) in &usage.usage_locations {
            println!("  {name}: {}", locations.join(", "));
        }
        return BatchOutcome::Success.exit_code();
    }

    if let Some(doc_path) = &cli.document {
        let doc = model2library::docgen::generate_documentation(
            &mut expander,
            &config,
            config_manager.config_path(),
            &Default::default(),
        );
        if let Err(e) = model2library::docgen::export_documentation(doc_path, &doc) {
            tracing::error!("Unable to write documentation to {}: {}", doc_path, e);
            eprintln!("Error: unable to write documentation: {e}");
            return BatchOutcome::HardFailure.exit_code();
        }
        println!("Documentation written to {doc_path}");
        return BatchOutcome::Success.exit_code();
    }

    // Restrict the batch to a single application when requested.
    let config = match &cli.app {
        Some(name) => match config.application(name) {
            Some(app) => {
                let mut selected = LibraryConfig {
                    variables: config.variables.clone(),
                    applications: indexmap::IndexMap::new(),
                };
                selected.applications.insert(name.clone(), app.clone());
                selected
            }
            None => {
                tracing::error!("Application '{}' not found in configuration", name);
                eprintln!(
                    "Error: application '{name}' not found (available: {})",
                    config.application_names().join(", ")
                );
                return BatchOutcome::HardFailure.exit_code();
            }
        },
        None => config,
    };

    let options = BatchOptions {
        dry_run: cli.dry_run,
        rules: Default::default(),
    };
    let report = run_batch(&config, &mut expander, &options, None);

    if let Some(fatal) = &report.fatal {
        tracing::error!("Batch aborted: {}", fatal);
        eprintln!("Error: {fatal}");
        return report.outcome.exit_code();
    }

    for result in &report.results {
        println!("{}: {}", result.name, result.outcome);
        for error in &result.errors {
            println!("  error: {error}");
        }
    }
    println!("{}", report.status.summary());

    tracing::info!("Run finished: {}", report.status.summary());
    report.outcome.exit_code()
}
