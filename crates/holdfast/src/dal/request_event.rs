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

//! Request event DAL: the append-only audit trail of status transitions.
//!
//! Events are written by the transition operations themselves; this module
//! only reads and prunes them.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::models::RequestEventRow;
use super::DAL;
use crate::database::schema::request_events;
use crate::database::with_connection;
use crate::error::StoreError;
use crate::models::deferred_request::RequestId;
use crate::models::request_event::RequestEvent;

#[derive(Clone)]
pub struct RequestEventDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RequestEventDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Lists all events for a request in the order they were written.
    pub async fn list_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Vec<RequestEvent>, StoreError> {
        let request_id = request_id.to_string();
        let rows: Vec<RequestEventRow> = with_connection!(self.dal.database, |conn| {
            request_events::table
                .filter(request_events::request_id.eq(request_id))
                .order(request_events::created_at.asc())
                .select(RequestEventRow::as_select())
                .load(conn)
        })?;

        rows.into_iter().map(RequestEvent::try_from).collect()
    }

    /// Counts events older than `cutoff`.
    pub async fn count_older_than(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        let cutoff = cutoff.naive_utc();
        let count = with_connection!(self.dal.database, |conn| {
            request_events::table
                .filter(request_events::created_at.lt(cutoff))
                .count()
                .get_result::<i64>(conn)
        })?;
        Ok(count)
    }

    /// Deletes events older than `cutoff`, returning how many were removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = cutoff.naive_utc();
        let deleted = with_connection!(self.dal.database, |conn| {
            diesel::delete(request_events::table.filter(request_events::created_at.lt(cutoff)))
                .execute(conn)
        })?;
        Ok(deleted)
    }
}
