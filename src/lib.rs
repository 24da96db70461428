//! specrun - integration test orchestrator
//!
//! Resolves fixtures to isolated copies, boots the application under test
//! once per runner process, and drives one runner over a selection of spec
//! suites.

pub mod app;
pub mod cli;
pub mod commands;
pub mod common;
pub mod db;
pub mod fixtures;
pub mod harness;
pub mod orchestrator;
pub mod scenario;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use fixtures::{FixtureDirs, FixtureResolver};
pub use harness::Harness;
