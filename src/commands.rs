//! CLI command definitions
//!
//! Defines the clap commands for the specrun CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::orchestrator::{Selection, Subset};

#[derive(Subcommand)]
pub enum Commands {
    /// Run test suites (the default when no command is given)
    Run(RunArgs),

    /// List the suites a plain run would select
    List,

    /// Show every fixture key and where it resolves from
    Fixtures,

    /// Drop the test database configured for the current environment
    DropDb,

    /// Execute spec files in this process (used by `run`)
    #[command(hide = true)]
    Exec {
        /// Spec files, run in order
        files: Vec<PathBuf>,

        /// File listing one spec path per line, run after FILES
        #[arg(long)]
        list: Option<PathBuf>,

        /// Print every step
        #[arg(long, short)]
        verbose: bool,
    },
}

/// Suite selection for `run`
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Suite names, without directory or suffix
    pub suites: Vec<String>,

    /// Run only the smoke subset
    #[arg(long, conflicts_with_all = ["import_only", "suites"])]
    pub smoke: bool,

    /// Run only the import subset
    #[arg(long, conflicts_with = "suites")]
    pub import_only: bool,
}

impl RunArgs {
    pub fn selection(&self) -> Selection {
        if !self.suites.is_empty() {
            Selection::Named(self.suites.clone())
        } else if self.smoke {
            Selection::Subset(Subset::Smoke)
        } else if self.import_only {
            Selection::Subset(Subset::Import)
        } else {
            Selection::All
        }
    }
}
