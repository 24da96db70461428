//! Built-in spec runner
//!
//! Reads YAML spec files and executes their steps against the shared
//! application handle and fixture resolver. This is what `specrun run`
//! launches unless an external runner is configured.

mod config;
mod runner;

pub use config::*;
pub use runner::{print_summary, CaseResult, Runner, SpecResult};
