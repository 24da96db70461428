//! Common utilities shared by every component

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
