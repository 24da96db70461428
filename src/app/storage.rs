//! Document storage used by specs to reset and inspect application data
//!
//! [`PgDocumentStore`] keeps each collection in its own PostgreSQL table with
//! a single `jsonb` document column. Filters are JSON objects matched with
//! containment (`doc @> filter`), so `{}` matches every document.

use std::error::Error as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use postgres::error::SqlState;
use postgres::NoTls;
use serde_json::Value;
use thiserror::Error;

use super::Component;
use crate::common::Result;

/// Upper bound on establishing a server connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Collection '{0}' does not exist")]
    MissingCollection(String),

    #[error("Invalid collection name '{0}'. Use letters, digits and underscores")]
    InvalidName(String),

    #[error("{0}")]
    Backend(String),
}

/// Filter-based access to document collections
#[async_trait]
pub trait Storage: Send + Sync {
    /// Delete every document matching `filter`, returning how many went away
    async fn delete_many(&self, collection: &str, filter: &Value) -> StorageResult<u64>;

    /// Insert a document, creating the collection if needed
    async fn insert(&self, collection: &str, doc: Value) -> StorageResult<()>;

    /// Documents matching `filter`; a missing collection has none
    async fn find(&self, collection: &str, filter: &Value) -> StorageResult<Vec<Value>>;
}

/// PostgreSQL-backed document store
///
/// The blocking client is driven from `spawn_blocking`. The connection is
/// opened lazily and reopened if the server closed it.
pub struct PgDocumentStore {
    config: postgres::Config,
    client: Arc<Mutex<Option<postgres::Client>>>,
}

impl PgDocumentStore {
    pub fn new(uri: &str) -> StorageResult<Self> {
        let mut config: postgres::Config = uri
            .parse()
            .map_err(|e: postgres::Error| StorageError::Backend(describe_pg_error(&e)))?;
        config.connect_timeout(CONNECT_TIMEOUT);
        Ok(Self {
            config,
            client: Arc::new(Mutex::new(None)),
        })
    }

    async fn with_client<T, F>(&self, collection: &str, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut postgres::Client) -> std::result::Result<T, postgres::Error> + Send + 'static,
    {
        let config = self.config.clone();
        let slot = Arc::clone(&self.client);

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let mut client = match guard.take() {
                Some(client) if !client.is_closed() => client,
                _ => config.connect(NoTls)?,
            };
            let result = f(&mut client);
            *guard = Some(client);
            result
        })
        .await
        .map_err(|e| StorageError::Backend(format!("storage task failed: {e}")))?;

        result.map_err(|e| classify(e, collection))
    }

    /// Open (or check) the connection
    pub async fn ping(&self) -> StorageResult<()> {
        self.with_client("", |client| client.simple_query("SELECT 1").map(|_| ()))
            .await
    }
}

impl Drop for PgDocumentStore {
    fn drop(&mut self) {
        // The blocking client shuts down its own runtime on drop, which panics
        // on an async worker thread
        let client = match self.client.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(std::sync::TryLockError::Poisoned(e)) => e.into_inner().take(),
            // A blocking task holds the client and its Arc; it drops it there
            Err(std::sync::TryLockError::WouldBlock) => None,
        };
        if let Some(client) = client {
            let _ = std::thread::spawn(move || drop(client));
        }
    }
}

fn classify(err: postgres::Error, collection: &str) -> StorageError {
    if err.code() == Some(&SqlState::UNDEFINED_TABLE) {
        StorageError::MissingCollection(collection.to_string())
    } else {
        StorageError::Backend(describe_pg_error(&err))
    }
}

/// Full text of a PostgreSQL error
///
/// `Display` on [`postgres::Error`] only names the error kind ("db error"),
/// so server errors are rendered with their SQLSTATE and message, and client
/// errors with their source chain.
pub fn describe_pg_error(err: &postgres::Error) -> String {
    if let Some(db) = err.as_db_error() {
        let mut text = format!("{} [{}]: {}", db.severity(), db.code().code(), db.message());
        if let Some(detail) = db.detail() {
            text.push_str(&format!(" ({detail})"));
        }
        return text;
    }

    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Quote a collection name for use as a table identifier
fn table(collection: &str) -> StorageResult<String> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("\"{collection}\""))
    } else {
        Err(StorageError::InvalidName(collection.to_string()))
    }
}

#[async_trait]
impl Storage for PgDocumentStore {
    async fn delete_many(&self, collection: &str, filter: &Value) -> StorageResult<u64> {
        let sql = format!("DELETE FROM {} WHERE doc @> $1", table(collection)?);
        let filter = filter.clone();
        self.with_client(collection, move |client| client.execute(&sql, &[&filter]))
            .await
    }

    async fn insert(&self, collection: &str, doc: Value) -> StorageResult<()> {
        let table = table(collection)?;
        let create =
            format!("CREATE TABLE IF NOT EXISTS {table} (id BIGSERIAL PRIMARY KEY, doc JSONB NOT NULL)");
        let insert = format!("INSERT INTO {table} (doc) VALUES ($1)");
        self.with_client(collection, move |client| {
            client.batch_execute(&create)?;
            client.execute(&insert, &[&doc]).map(|_| ())
        })
        .await
    }

    async fn find(&self, collection: &str, filter: &Value) -> StorageResult<Vec<Value>> {
        let sql = format!("SELECT doc FROM {} WHERE doc @> $1 ORDER BY id", table(collection)?);
        let filter = filter.clone();
        let rows = self
            .with_client(collection, move |client| client.query(&sql, &[&filter]))
            .await;
        match rows {
            Ok(rows) => Ok(rows.iter().map(|row| row.get::<_, Value>(0)).collect()),
            Err(StorageError::MissingCollection(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Component for PgDocumentStore {
    async fn ready(&self) -> Result<()> {
        Ok(self.ping().await?)
    }

    fn as_storage(&self) -> Option<&dyn Storage> {
        Some(self)
    }
}
