//! Test orchestration
//!
//! `specrun run` resolves the selection first, so an unknown suite fails
//! before anything touches the database. Then it drops the test database and
//! hands the whole selection to one runner process.

mod execute;
mod selection;

use std::path::Path;

use crate::common::config::Settings;
use crate::common::{paths, Result};
use crate::db;

pub use execute::{execute, exit_code, write_list, RunnerCommand};
pub use selection::{discover, select, Layout, Selection, Subset, TestSelection};

/// Run a selection and return the exit code to terminate with
pub async fn run(root: &Path, settings: &Settings, selection: &Selection) -> Result<i32> {
    let layout = Layout::new(root, settings);
    let tests = select(&layout, settings, selection)?;
    if tests.is_empty() {
        tracing::warn!(dir = %layout.tests_dir.display(), "No suites selected");
        return Ok(0);
    }
    let runner = RunnerCommand::resolve(root, settings)?;

    let env = paths::runtime_env();
    if db::drop_database(root, &env).await {
        tracing::info!(env = %env, "Reset test database");
    } else {
        tracing::debug!(env = %env, "Test database not dropped");
    }

    tracing::info!(suites = tests.files.len(), "Running suites");
    execute(&runner, &tests).await
}
