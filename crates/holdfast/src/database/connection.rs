/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Connection pooling with runtime backend selection.
//!
//! Pools are built with `deadpool-diesel`. The backend is detected from the
//! connection string:
//!
//! - `postgres://` or `postgresql://` selects PostgreSQL
//! - `sqlite://`, `file:` URIs, file paths, or `:memory:` select SQLite
//!
//! ```rust,ignore
//! use holdfast::database::Database;
//!
//! let db = Database::new("sqlite://holdfast.db", 4)?;
//! db.run_migrations().await?;
//! ```

use tracing::info;

#[cfg(feature = "postgres")]
use deadpool_diesel::postgres::{Manager as PgManager, Pool as PgPool, Runtime as PgRuntime};
#[cfg(feature = "sqlite")]
use deadpool_diesel::sqlite::{
    Hook as SqliteHook, HookError as SqliteHookError, Manager as SqliteManager,
    Pool as SqlitePool, Runtime as SqliteRuntime,
};

use crate::error::StoreError;

/// The database backend, detected at runtime from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Postgres,
    Sqlite,
}

impl BackendType {
    /// Detects the backend from a connection URL.
    ///
    /// Returns `None` when the URL does not look like either backend.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Some(BackendType::Postgres);
        }

        if url.starts_with("sqlite://")
            || url.starts_with("file:")
            || url.starts_with('/')
            || url.starts_with("./")
            || url.starts_with("../")
            || url == ":memory:"
            || url.ends_with(".db")
            || url.ends_with(".sqlite")
            || url.ends_with(".sqlite3")
        {
            return Some(BackendType::Sqlite);
        }

        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Postgres => "postgres",
            BackendType::Sqlite => "sqlite",
        }
    }
}

/// A connection pool for whichever backend is compiled in and selected.
#[derive(Clone)]
pub enum AnyPool {
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for AnyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(_) => write!(f, "AnyPool::Postgres(...)"),
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(_) => write!(f, "AnyPool::Sqlite(...)"),
        }
    }
}

/// Shared handle to the request store's connection pool.
///
/// `Database` is cheap to clone; every clone references the same pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: AnyPool,
    backend: BackendType,
}

impl Database {
    /// Creates a connection pool for `connection_string`.
    ///
    /// SQLite pools are always capped at a single connection: concurrent
    /// writers on one file contend for the same lock, and an in-memory
    /// database only exists on the connection that created it.
    pub fn new(connection_string: &str, max_size: u32) -> Result<Self, StoreError> {
        let backend = BackendType::from_url(connection_string)
            .ok_or_else(|| StoreError::UnsupportedBackend(connection_string.to_string()))?;

        match backend {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => {
                let manager = PgManager::new(connection_string, PgRuntime::Tokio1);
                let pool = PgPool::builder(manager)
                    .max_size(max_size as usize)
                    .build()
                    .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

                info!(max_size, "PostgreSQL connection pool initialized");

                Ok(Self {
                    pool: AnyPool::Postgres(pool),
                    backend,
                })
            }
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => {
                let connection_url = Self::build_sqlite_url(connection_string);
                let manager = SqliteManager::new(connection_url, SqliteRuntime::Tokio1);
                let sqlite_pool_size = 1;
                let pool = SqlitePool::builder(manager)
                    .max_size(sqlite_pool_size)
                    .post_create(SqliteHook::async_fn(|conn, _| {
                        Box::pin(async move {
                            conn.interact(configure_sqlite)
                                .await
                                .map_err(|e| SqliteHookError::Message(e.to_string().into()))?
                                .map_err(|e| SqliteHookError::Message(e.to_string().into()))
                        })
                    }))
                    .build()
                    .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

                info!(
                    requested = max_size,
                    size = sqlite_pool_size,
                    "SQLite connection pool initialized"
                );

                Ok(Self {
                    pool: AnyPool::Sqlite(pool),
                    backend,
                })
            }
            #[allow(unreachable_patterns)]
            _ => Err(StoreError::UnsupportedBackend(format!(
                "{} (backend '{}' not compiled in)",
                connection_string,
                backend.as_str()
            ))),
        }
    }

    pub fn backend(&self) -> BackendType {
        self.backend
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    #[cfg(feature = "sqlite")]
    fn build_sqlite_url(connection_string: &str) -> String {
        match connection_string.strip_prefix("sqlite://") {
            Some(path) => path.to_string(),
            None => connection_string.to_string(),
        }
    }

    /// Applies pending migrations for the active backend.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        use diesel_migrations::MigrationHarness;

        match &self.pool {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(pool) => {
                let conn = pool
                    .get()
                    .await
                    .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;
                conn.interact(|conn| {
                    conn.run_pending_migrations(crate::database::POSTGRES_MIGRATIONS)
                        .map(|_| ())
                        .map_err(|e| StoreError::Migration(e.to_string()))
                })
                .await
                .map_err(|e| StoreError::Migration(e.to_string()))??;
            }
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(pool) => {
                let conn = pool
                    .get()
                    .await
                    .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;
                conn.interact(|conn| {
                    conn.run_pending_migrations(crate::database::SQLITE_MIGRATIONS)
                        .map(|_| ())
                        .map_err(|e| StoreError::Migration(e.to_string()))
                })
                .await
                .map_err(|e| StoreError::Migration(e.to_string()))??;
            }
        }

        info!(backend = self.backend.as_str(), "Database migrations applied");
        Ok(())
    }
}

/// Applied to every new SQLite connection: WAL journaling, and a busy
/// timeout so a second process waits for the write lock instead of failing.
#[cfg(feature = "sqlite")]
fn configure_sqlite(conn: &mut diesel::SqliteConnection) -> Result<(), diesel::result::Error> {
    use diesel::connection::SimpleConnection;

    conn.batch_execute(&format!(
        "PRAGMA journal_mode=WAL; PRAGMA busy_timeout={};",
        SQLITE_BUSY_TIMEOUT_MS
    ))
}

#[cfg(feature = "sqlite")]
const SQLITE_BUSY_TIMEOUT_MS: u32 = 30_000;
