//! Pre-run database reset
//!
//! The test database is dropped and created again, empty, so every run starts
//! from a clean slate while the application keeps a database to connect to.
//! Starting clean is nice to have, not required: every failure here, from a
//! missing config file to an unreachable server, ends up as "not dropped".

use std::path::Path;

use postgres::NoTls;

use crate::app::{describe_pg_error, CONNECT_TIMEOUT};
use crate::common::config::DbConfig;
use crate::common::paths::db_config_path;
use crate::common::{Error, Result};

/// Database connected to while the target database is dropped
const MAINTENANCE_DB: &str = "postgres";

/// Reset the database named in `conf/<env>.config.toml`
///
/// Returns `true` only if the database was dropped and recreated.
pub async fn drop_database(root: &Path, env: &str) -> bool {
    match try_drop(root, env).await {
        Ok(dropped) => dropped,
        Err(e) => {
            tracing::debug!(error = %e, "database drop skipped");
            false
        }
    }
}

async fn try_drop(root: &Path, env: &str) -> Result<bool> {
    let path = db_config_path(root, env);
    let Some(uri) = DbConfig::connection_uri(&path)? else {
        tracing::debug!(path = %path.display(), "no database configured");
        return Ok(false);
    };
    reset_database(&uri).await
}

/// Drop and recreate the database a connection URI points at
pub async fn reset_database(uri: &str) -> Result<bool> {
    let uri = uri.to_string();
    tokio::task::spawn_blocking(move || reset_blocking(&uri))
        .await
        .map_err(|e| Error::Internal(format!("database drop task failed: {e}")))?
}

/// Connection settings for the maintenance database, plus the target name
///
/// `None` when the URI names no database or names the maintenance one.
fn maintenance_config(uri: &str) -> Result<Option<(postgres::Config, String)>> {
    let mut config: postgres::Config = uri
        .parse()
        .map_err(|e: postgres::Error| {
            Error::Config(format!("Invalid connection URI: {}", describe_pg_error(&e)))
        })?;

    let Some(target) = config.get_dbname().map(str::to_string) else {
        return Ok(None);
    };
    if target == MAINTENANCE_DB {
        tracing::warn!("refusing to drop the maintenance database");
        return Ok(None);
    }

    config.dbname(MAINTENANCE_DB);
    config.connect_timeout(CONNECT_TIMEOUT);
    Ok(Some((config, target)))
}

fn reset_blocking(uri: &str) -> Result<bool> {
    let Some((config, target)) = maintenance_config(uri)? else {
        return Ok(false);
    };
    let pg_err = |step: &str, e: postgres::Error| {
        Error::Internal(format!("{step} failed: {}", describe_pg_error(&e)))
    };

    let mut client = config.connect(NoTls).map_err(|e| pg_err("connect", e))?;

    let owner: Option<String> = client
        .query_opt(
            "SELECT pg_catalog.pg_get_userbyid(datdba) \
             FROM pg_catalog.pg_database WHERE datname = $1",
            &[&target],
        )
        .map_err(|e| pg_err("owner lookup", e))?
        .map(|row| row.get(0));

    let ident = quote_ident(&target);
    client
        .batch_execute(&format!("DROP DATABASE IF EXISTS {ident} WITH (FORCE)"))
        .map_err(|e| pg_err("drop", e))?;

    let plain = format!("CREATE DATABASE {ident}");
    match &owner {
        Some(owner) => {
            let owned = format!("{plain} OWNER {}", quote_ident(owner));
            if let Err(e) = client.batch_execute(&owned) {
                // Only members of the owning role may assign it
                tracing::debug!(
                    error = %describe_pg_error(&e),
                    "recreating without the previous owner"
                );
                client.batch_execute(&plain).map_err(|e| pg_err("create", e))?;
            }
        }
        None => client.batch_execute(&plain).map_err(|e| pg_err("create", e))?,
    }

    client.close().map_err(|e| pg_err("disconnect", e))?;

    tracing::info!(database = %target, owner = ?owner, "reset test database");
    Ok(true)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
