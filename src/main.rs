//! specrun - integration test orchestrator
//!
//! Selects spec suites, resets the test database and runs every selected
//! suite in a single runner process against one booted application.

use std::path::PathBuf;

use clap::Parser;
use commands::{Commands, RunArgs};
use specrun::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "specrun", about = "Integration test orchestrator")]
#[command(version, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    logging::init_cli();

    let cli = Cli::parse();
    let root = cli.root.unwrap_or_else(|| PathBuf::from("."));
    let command = cli.command.unwrap_or(Commands::Run(cli.run));

    match cli::dispatch(command, &root).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
