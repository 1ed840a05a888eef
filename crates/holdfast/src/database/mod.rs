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

//! Database connection management and schema.
//!
//! The engine runs against either PostgreSQL or SQLite, selected at runtime
//! from the connection URL. Both backends share one diesel schema; each has
//! its own embedded migration set.

pub mod connection;
pub mod schema;

pub use connection::{AnyPool, BackendType, Database};

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("holdfast requires at least one of the `postgres` or `sqlite` features");

#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

#[cfg(feature = "sqlite")]
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Runs a diesel closure on a pooled connection of whichever backend is active.
///
/// The body is expanded once per enabled backend, so it must only use query
/// builder constructs both backends support. Evaluates to
/// `Result<T, diesel::result::Error>` after pool and interact failures have
/// been mapped to [`StoreError::ConnectionPool`](crate::error::StoreError).
macro_rules! with_connection {
    ($database:expr, |$conn:ident| $body:expr) => {{
        match $database.pool() {
            #[cfg(feature = "postgres")]
            $crate::database::AnyPool::Postgres(pool) => {
                let obj = pool
                    .get()
                    .await
                    .map_err(|e| $crate::error::StoreError::ConnectionPool(e.to_string()))?;
                obj.interact(move |$conn| $body)
                    .await
                    .map_err(|e| $crate::error::StoreError::ConnectionPool(e.to_string()))?
            }
            #[cfg(feature = "sqlite")]
            $crate::database::AnyPool::Sqlite(pool) => {
                let obj = pool
                    .get()
                    .await
                    .map_err(|e| $crate::error::StoreError::ConnectionPool(e.to_string()))?;
                obj.interact(move |$conn| $body)
                    .await
                    .map_err(|e| $crate::error::StoreError::ConnectionPool(e.to_string()))?
            }
        }
    }};
}

pub(crate) use with_connection;
