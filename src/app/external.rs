//! The application as an external process reached over HTTP

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::Mutex;

use super::{Application, Component, PgDocumentStore, DATABASE_MODULE, HTTP_MODULE};
use crate::common::config::AppSettings;
use crate::common::{Error, Result};

/// Delay between readiness probes
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A response from the application's HTTP API
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// HTTP client bound to the application's base URL
pub struct AppClient {
    client: reqwest::Client,
    base_url: String,
    health_path: String,
}

impl AppClient {
    pub fn new(base_url: &str, health_path: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            health_path: health_path.to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// One health probe; `true` on a success status
    pub async fn probe(&self) -> bool {
        match self.client.get(self.url(&self.health_path)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!(error = %e, "health probe failed");
                false
            }
        }
    }

    /// Send a request to the application
    pub async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::Config(format!("Invalid HTTP method '{}'", method)))?;

        let mut request = self.client.request(method, self.url(path));
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Component for AppClient {
    async fn ready(&self) -> Result<()> {
        while !self.probe().await {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    fn as_http(&self) -> Option<&AppClient> {
        Some(self)
    }
}

/// The application under test
///
/// When `command` is configured the process is spawned on boot and killed on
/// shutdown (or when this value is dropped). Otherwise the application is
/// expected to be running already and is only polled.
pub struct ExternalApp {
    http: Arc<AppClient>,
    components: HashMap<String, Arc<dyn Component>>,
    child: Mutex<Option<Child>>,
}

impl ExternalApp {
    /// Start the application process (if configured) and wire up components
    pub async fn boot(settings: &AppSettings, database_uri: Option<&str>) -> Result<Self> {
        let http = Arc::new(AppClient::new(&settings.base_url, &settings.health_path));

        let mut components: HashMap<String, Arc<dyn Component>> = HashMap::new();
        components.insert(HTTP_MODULE.to_string(), http.clone());
        if let Some(uri) = database_uri {
            components.insert(
                DATABASE_MODULE.to_string(),
                Arc::new(PgDocumentStore::new(uri)?),
            );
        }

        let child = match &settings.command {
            Some(command) => {
                tracing::info!(command = %command, "Starting application process");
                let child = TokioCommand::new(command)
                    .args(&settings.args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| {
                        Error::Config(format!("Failed to start application '{}': {}", command, e))
                    })?;
                Some(child)
            }
            None => None,
        };

        Ok(Self {
            http,
            components,
            child: Mutex::new(child),
        })
    }

    pub fn http(&self) -> &AppClient {
        &self.http
    }
}

#[async_trait]
impl Application for ExternalApp {
    async fn ready(&self) -> Result<()> {
        loop {
            if let Some(child) = self.child.lock().await.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(Error::AppExited(status.code()));
                }
            }
            if self.http.probe().await {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn component(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).cloned()
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(mut child) = self.child.lock().await.take() {
            tracing::info!("Stopping application process");
            child.kill().await?;
        }
        Ok(())
    }
}
