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

//! Request Outbox DAL
//!
//! The outbox backs the default work queue. Entries are keyed by request id,
//! so enqueueing a request that already has a pending entry is a no-op.
//! Dequeueing deletes the entry; a worker that dies after dequeueing leaves
//! its request `Executing` for the reconciler to pick up.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;

use super::models::OutboxRow;
use super::DAL;
use crate::database::schema::request_outbox;
use crate::database::{with_connection, AnyPool};
use crate::error::StoreError;
use crate::models::deferred_request::RequestId;
use crate::models::request_outbox::OutboxEntry;

#[derive(Clone)]
pub struct RequestOutboxDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RequestOutboxDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Adds an entry that becomes visible at `available_at`.
    ///
    /// Returns `false` if the request already had a pending entry.
    pub async fn insert(
        &self,
        request_id: RequestId,
        available_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let row = OutboxRow {
            request_id: request_id.to_string(),
            available_at: available_at.naive_utc(),
            created_at: Utc::now().naive_utc(),
        };

        let inserted = with_connection!(self.dal.database, |conn| {
            diesel::insert_into(request_outbox::table)
                .values(&row)
                .on_conflict(request_outbox::request_id)
                .do_nothing()
                .execute(conn)
        })?;

        Ok(inserted > 0)
    }

    /// Removes and returns the oldest entry whose `available_at` has passed.
    ///
    /// On PostgreSQL the entry is selected with `FOR UPDATE SKIP LOCKED`, so
    /// concurrent consumers each take a different due entry. SQLite pools
    /// hold a single connection, which already serializes consumers.
    pub async fn take_next(&self, now: DateTime<Utc>) -> Result<Option<OutboxEntry>, StoreError> {
        let now = now.naive_utc();
        let taken = match self.dal.database.pool() {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(pool) => take_next_postgres(pool, now).await?,
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(pool) => take_next_sqlite(pool, now).await?,
        };

        taken.map(OutboxEntry::try_from).transpose()
    }

    /// Lists pending entries, earliest first.
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        let rows: Vec<OutboxRow> = with_connection!(self.dal.database, |conn| {
            request_outbox::table
                .order(request_outbox::available_at.asc())
                .limit(limit)
                .select(OutboxRow::as_select())
                .load(conn)
        })?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    /// Counts all pending entries, including ones not yet due.
    pub async fn count_pending(&self) -> Result<i64, StoreError> {
        let count = with_connection!(self.dal.database, |conn| {
            request_outbox::table.count().get_result::<i64>(conn)
        })?;
        Ok(count)
    }
}

#[cfg(feature = "postgres")]
async fn take_next_postgres(
    pool: deadpool_diesel::postgres::Pool,
    now: NaiveDateTime,
) -> Result<Option<OutboxRow>, StoreError> {
    let conn = pool
        .get()
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

    let taken = conn
        .interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let next: Option<OutboxRow> = request_outbox::table
                    .filter(request_outbox::available_at.le(now))
                    .order(request_outbox::available_at.asc())
                    .select(OutboxRow::as_select())
                    .limit(1)
                    .for_update()
                    .skip_locked()
                    .get_result(conn)
                    .optional()?;

                let Some(next) = next else {
                    return Ok(None);
                };

                diesel::delete(
                    request_outbox::table
                        .filter(request_outbox::request_id.eq(next.request_id.clone())),
                )
                .execute(conn)?;

                Ok(Some(next))
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

    Ok(taken)
}

#[cfg(feature = "sqlite")]
async fn take_next_sqlite(
    pool: deadpool_diesel::sqlite::Pool,
    now: NaiveDateTime,
) -> Result<Option<OutboxRow>, StoreError> {
    let conn = pool
        .get()
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

    let taken = conn
        .interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let next: Option<OutboxRow> = request_outbox::table
                    .filter(request_outbox::available_at.le(now))
                    .order(request_outbox::available_at.asc())
                    .select(OutboxRow::as_select())
                    .first(conn)
                    .optional()?;

                let Some(next) = next else {
                    return Ok(None);
                };

                let deleted = diesel::delete(
                    request_outbox::table
                        .filter(request_outbox::request_id.eq(next.request_id.clone()))
                        .filter(request_outbox::available_at.eq(next.available_at)),
                )
                .execute(conn)?;

                Ok((deleted > 0).then_some(next))
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

    Ok(taken)
}
