//! The application under test
//!
//! Specs never boot the application themselves. They go through an
//! [`AppHandle`], which boots it once and hands every caller the same
//! instance, then look up named components on it (`http`, `database`).

mod external;
mod handle;
#[cfg(test)]
pub(crate) mod mock;
mod storage;

use std::sync::Arc;

use async_trait::async_trait;

use crate::common::Result;

pub use external::{AppClient, ExternalApp, HttpResponse};
pub use handle::{AppHandle, CleanReport, ReadyTimeouts};
pub use storage::{
    describe_pg_error, PgDocumentStore, Storage, StorageError, StorageResult, CONNECT_TIMEOUT,
};

/// Component exposing the document store
pub const DATABASE_MODULE: &str = "database";

/// Component exposing the application's HTTP API
pub const HTTP_MODULE: &str = "http";

/// A booted application
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// Resolves once the application has finished starting up
    async fn ready(&self) -> Result<()>;

    /// Look up a component by name, without waiting for it
    fn component(&self, name: &str) -> Option<Arc<dyn Component>>;

    /// Stop the application
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A named part of the application with its own readiness signal
#[async_trait]
pub trait Component: Send + Sync {
    async fn ready(&self) -> Result<()>;

    fn as_storage(&self) -> Option<&dyn Storage> {
        None
    }

    fn as_http(&self) -> Option<&AppClient> {
        None
    }
}
