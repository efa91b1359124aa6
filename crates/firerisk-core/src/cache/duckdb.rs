use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ::duckdb::{Connection, ToSql};
use time::OffsetDateTime;

use super::{CacheFuture, KeyValueBackend};
use crate::CacheError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS risk_cache (
    key VARCHAR PRIMARY KEY,
    value VARCHAR NOT NULL,
    expires_at BIGINT NOT NULL
);
";

/// Key-value backend persisted in a `DuckDB` table.
///
/// `DuckDB` calls are blocking, so every operation runs on the blocking pool
/// behind a single shared connection. `expires_at` is a housekeeping hint for
/// [`DuckDbBackend::purge_expired`]; `get` does not filter on it.
#[derive(Clone)]
pub struct DuckDbBackend {
    connection: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl DuckDbBackend {
    /// Opens (or creates) a database file and ensures the cache table exists.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let connection = Connection::open(&path)?;
        Self::initialize(connection, Some(path))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let connection = Connection::open_in_memory()?;
        Self::initialize(connection, None)
    }

    fn initialize(connection: Connection, db_path: Option<PathBuf>) -> Result<Self, CacheError> {
        connection.execute_batch("PRAGMA disable_progress_bar;")?;
        connection.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Deletes rows whose TTL hint has elapsed and returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if the delete statement fails.
    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        self.run_blocking(|connection| {
            let now = unix_millis_now();
            let params: [&dyn ToSql; 1] = [&now];
            Ok(connection.execute(
                "DELETE FROM risk_cache WHERE expires_at <= ?",
                params.as_slice(),
            )?)
        })
        .await
    }

    async fn run_blocking<T, F>(&self, operation: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let guard = connection
                .lock()
                .expect("duckdb cache connection mutex poisoned");
            operation(&guard)
        })
        .await
        .map_err(|error| CacheError::Backend(format!("duckdb task failed: {error}")))?
    }
}

impl KeyValueBackend for DuckDbBackend {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        let key = key.to_owned();
        Box::pin(self.run_blocking(move |connection| {
            let params: [&dyn ToSql; 1] = [&key];
            let mut statement =
                connection.prepare("SELECT value FROM risk_cache WHERE key = ?")?;
            let mut rows = statement.query(params.as_slice())?;
            let value = match rows.next()? {
                Some(row) => Some(row.get::<_, String>(0)?),
                None => None,
            };
            Ok(value)
        }))
    }

    fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
        let key = key.to_owned();
        Box::pin(self.run_blocking(move |connection| {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            let expires_at = unix_millis_now().saturating_add(ttl_ms);
            let params: [&dyn ToSql; 3] = [&key, &value, &expires_at];
            connection.execute(
                "INSERT OR REPLACE INTO risk_cache (key, value, expires_at) VALUES (?, ?, ?)",
                params.as_slice(),
            )?;
            Ok(())
        }))
    }

    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
        let key = key.to_owned();
        Box::pin(self.run_blocking(move |connection| {
            let params: [&dyn ToSql; 1] = [&key];
            connection.execute("DELETE FROM risk_cache WHERE key = ?", params.as_slice())?;
            Ok(())
        }))
    }
}

fn unix_millis_now() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
