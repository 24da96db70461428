//! CLI command handling
//!
//! Dispatches CLI commands and formats their output. Every command yields
//! the exit code the process terminates with.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Settings;
use crate::common::{paths, Result};
use crate::db;
use crate::fixtures::FixtureResolver;
use crate::harness::Harness;
use crate::orchestrator::{self, select, Layout, Selection};
use crate::scenario::{print_summary, Runner};

/// Dispatch a CLI command for the project at `root`
pub async fn dispatch(command: Commands, root: &Path) -> Result<i32> {
    let settings = Settings::load(root)?;

    match command {
        Commands::Run(args) => orchestrator::run(root, &settings, &args.selection()).await,

        Commands::List => {
            let layout = Layout::new(root, &settings);
            let selection = select(&layout, &settings, &Selection::All)?;
            if selection.is_empty() {
                println!("No suites found in {}", layout.tests_dir.display());
            }
            for file in &selection.files {
                let shown = file.strip_prefix(root).unwrap_or(file);
                println!("{}", shown.display());
            }
            if let Some(dir) = &selection.override_fixtures {
                println!("Override fixtures: {}", dir.display());
            }
            Ok(0)
        }

        Commands::Fixtures => {
            let resolver = FixtureResolver::from_env(root);
            let manifest = resolver.manifest()?;
            if manifest.is_empty() {
                println!("No fixtures defined");
            }
            for (key, entry) in manifest.iter() {
                println!(
                    "{:<32} {:<8} {}",
                    key,
                    entry.source.to_string().dimmed(),
                    entry.path().display()
                );
            }
            Ok(0)
        }

        Commands::DropDb => {
            let env = paths::runtime_env();
            if db::drop_database(root, &env).await {
                println!("Dropped and recreated database for environment '{}'", env);
            } else {
                println!("Nothing dropped for environment '{}'", env);
            }
            Ok(0)
        }

        Commands::Exec {
            files,
            list,
            verbose,
        } => exec(root, &settings, files, list, verbose).await,
    }
}

/// Run spec files in this process with the shared harness
async fn exec(
    root: &Path,
    settings: &Settings,
    mut files: Vec<PathBuf>,
    list: Option<PathBuf>,
    verbose: bool,
) -> Result<i32> {
    if let Some(list) = list {
        let content = std::fs::read_to_string(&list)?;
        files.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from),
        );
    }

    let harness = Harness::global(root, settings)?;
    let results = Runner::new(&harness.fixtures, &harness.app, verbose)
        .run_all(&files)
        .await;
    let passed = print_summary(&results);

    if let Err(e) = harness.teardown().await {
        tracing::warn!(error = %e, "Teardown failed");
    }

    Ok(if passed { 0 } else { 1 })
}
