//! Single-boot application handle

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::OnceCell;

use super::{Application, Component, StorageError, DATABASE_MODULE};
use crate::common::config::AppSettings;
use crate::common::{Error, Result};

type BootFn<A> = Box<dyn Fn() -> BoxFuture<'static, Result<A>> + Send + Sync>;

/// Upper bounds on readiness waits
#[derive(Debug, Clone, Copy)]
pub struct ReadyTimeouts {
    /// Boot plus the application's own readiness signal
    pub boot: Duration,
    /// A single component's readiness signal
    pub module: Duration,
}

impl Default for ReadyTimeouts {
    fn default() -> Self {
        Self {
            boot: Duration::from_secs(120),
            module: Duration::from_secs(30),
        }
    }
}

impl From<&AppSettings> for ReadyTimeouts {
    fn from(settings: &AppSettings) -> Self {
        Self {
            boot: settings.boot_timeout(),
            module: settings.module_timeout(),
        }
    }
}

/// Outcome of [`AppHandle::clean_db`]
#[derive(Debug, Default)]
pub struct CleanReport {
    /// Collections that were emptied, with the number of removed documents
    pub cleared: Vec<(String, u64)>,
    /// Collections that did not exist yet
    pub missing: Vec<String>,
    /// Collections that could not be cleared
    pub failed: Vec<(String, StorageError)>,
}

impl CleanReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Boots the application at most once and shares it
///
/// Concurrent first callers of [`app`](Self::app) wait on the same in-flight
/// boot. A boot that fails (or times out) is not cached, so a later call
/// boots again.
pub struct AppHandle<A: Application> {
    boot: BootFn<A>,
    cell: OnceCell<Arc<A>>,
    timeouts: ReadyTimeouts,
}

impl<A: Application> AppHandle<A> {
    pub fn new<F, Fut>(boot: F, timeouts: ReadyTimeouts) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A>> + Send + 'static,
    {
        Self {
            boot: Box::new(move || -> BoxFuture<'static, Result<A>> { Box::pin(boot()) }),
            cell: OnceCell::new(),
            timeouts,
        }
    }

    /// The shared application, booting it on first use
    pub async fn app(&self) -> Result<Arc<A>> {
        let app = self.cell.get_or_try_init(|| self.boot_once()).await?;
        Ok(Arc::clone(app))
    }

    pub fn is_booted(&self) -> bool {
        self.cell.initialized()
    }

    async fn boot_once(&self) -> Result<Arc<A>> {
        tracing::info!("Booting application");
        let app = (self.boot)().await?;

        let limit = self.timeouts.boot;
        tokio::time::timeout(limit, app.ready())
            .await
            .map_err(|_| Error::ready_timeout("application", limit.as_secs()))??;

        tracing::info!("Application ready");
        Ok(Arc::new(app))
    }

    /// A named component, once it reports ready
    pub async fn module(&self, name: &str) -> Result<Arc<dyn Component>> {
        let app = self.app().await?;
        let component = app
            .component(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;

        let limit = self.timeouts.module;
        tokio::time::timeout(limit, component.ready())
            .await
            .map_err(|_| Error::ready_timeout(&format!("module '{name}'"), limit.as_secs()))??;

        Ok(component)
    }

    /// Empty the given collections
    ///
    /// Collections that don't exist yet are expected and only recorded.
    /// Any other per-collection failure is logged and recorded without
    /// stopping the remaining clears; the caller decides what to do with
    /// [`CleanReport::failed`]. Fails only if the storage component itself
    /// is unavailable.
    pub async fn clean_db<S: AsRef<str>>(&self, collections: &[S]) -> Result<CleanReport> {
        let component = self.module(DATABASE_MODULE).await?;
        let storage = component.as_storage().ok_or_else(|| {
            Error::Config(format!("Module '{DATABASE_MODULE}' does not provide storage"))
        })?;

        let everything = serde_json::json!({});
        let mut report = CleanReport::default();

        for collection in collections {
            let collection = collection.as_ref();
            match storage.delete_many(collection, &everything).await {
                Ok(removed) => {
                    tracing::debug!(collection, removed, "cleared collection");
                    report.cleared.push((collection.to_string(), removed));
                }
                Err(StorageError::MissingCollection(_)) => {
                    tracing::debug!(collection, "collection does not exist yet");
                    report.missing.push(collection.to_string());
                }
                Err(e) => {
                    tracing::warn!(collection, error = %e, "failed to clear collection");
                    report.failed.push((collection.to_string(), e));
                }
            }
        }

        Ok(report)
    }

    /// Stop the application if it was booted
    pub async fn shutdown(&self) -> Result<()> {
        match self.cell.get() {
            Some(app) => app.shutdown().await,
            None => Ok(()),
        }
    }
}
