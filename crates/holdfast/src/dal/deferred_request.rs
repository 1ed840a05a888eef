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

//! Deferred request DAL.
//!
//! Creation and read operations live here; status transitions live in the
//! `transitions` submodule.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::json;

use super::models::{DeferredRequestRow, NewDeferredRequestRow, NewRequestEventRow};
use super::DAL;
use crate::database::schema::{deferred_requests, request_events};
use crate::database::with_connection;
use crate::error::StoreError;
use crate::models::deferred_request::{
    DeferredRequest, NewDeferredRequest, RequestId, RequestStatus,
};
use crate::models::request_event::RequestEventType;

mod transitions;

pub use transitions::TransitionOutcome;

/// Data access for the `deferred_requests` table.
#[derive(Clone)]
pub struct DeferredRequestDAL<'a> {
    dal: &'a DAL,
}

impl<'a> DeferredRequestDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Persists a new request in `Received` together with its creation event.
    pub async fn create(
        &self,
        new_request: NewDeferredRequest,
    ) -> Result<DeferredRequest, StoreError> {
        let now = Utc::now().naive_utc();
        let id = RequestId::new().to_string();

        let event = NewRequestEventRow {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: id.clone(),
            event_type: RequestEventType::RequestCreated.as_str().to_string(),
            event_data: Some(
                json!({ "upload_correlation_id": new_request.upload_correlation_id }).to_string(),
            ),
            created_at: now,
        };
        let row = NewDeferredRequestRow {
            id,
            owner_id: new_request.owner_id,
            upload_correlation_id: new_request.upload_correlation_id,
            payload: new_request.payload,
            status: RequestStatus::Received.as_str().to_string(),
            attempts: 0,
            created_at: now,
            updated_at: now,
        };

        let created: DeferredRequestRow = with_connection!(self.dal.database, |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(deferred_requests::table)
                    .values(&row)
                    .execute(conn)?;
                diesel::insert_into(request_events::table)
                    .values(&event)
                    .execute(conn)?;

                deferred_requests::table
                    .find(row.id.clone())
                    .select(DeferredRequestRow::as_select())
                    .first(conn)
            })
        })?;

        created.try_into()
    }

    /// Looks up a request by id regardless of owner.
    pub async fn get(&self, id: RequestId) -> Result<Option<DeferredRequest>, StoreError> {
        let id = id.to_string();
        let row: Option<DeferredRequestRow> = with_connection!(self.dal.database, |conn| {
            deferred_requests::table
                .find(id)
                .select(DeferredRequestRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(DeferredRequest::try_from).transpose()
    }

    /// Looks up a request by id, only if it belongs to `owner_id`.
    pub async fn get_for_owner(
        &self,
        owner_id: &str,
        id: RequestId,
    ) -> Result<Option<DeferredRequest>, StoreError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let row: Option<DeferredRequestRow> = with_connection!(self.dal.database, |conn| {
            deferred_requests::table
                .filter(deferred_requests::id.eq(id))
                .filter(deferred_requests::owner_id.eq(owner_id))
                .select(DeferredRequestRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(DeferredRequest::try_from).transpose()
    }

    pub async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<DeferredRequest>, StoreError> {
        let correlation_id = correlation_id.to_string();
        let row: Option<DeferredRequestRow> = with_connection!(self.dal.database, |conn| {
            deferred_requests::table
                .filter(deferred_requests::upload_correlation_id.eq(correlation_id))
                .select(DeferredRequestRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(DeferredRequest::try_from).transpose()
    }

    /// Lists requests in `status` that have not changed since before `cutoff`,
    /// oldest first.
    pub async fn list_stale(
        &self,
        status: RequestStatus,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeferredRequest>, StoreError> {
        let cutoff = cutoff.naive_utc();
        let rows: Vec<DeferredRequestRow> = with_connection!(self.dal.database, |conn| {
            deferred_requests::table
                .filter(deferred_requests::status.eq(status.as_str()))
                .filter(deferred_requests::updated_at.lt(cutoff))
                .order(deferred_requests::updated_at.asc())
                .limit(limit)
                .select(DeferredRequestRow::as_select())
                .load(conn)
        })?;

        rows.into_iter().map(DeferredRequest::try_from).collect()
    }

    /// Number of requests in each status. Statuses with no rows are omitted.
    pub async fn count_by_status(&self) -> Result<Vec<(RequestStatus, i64)>, StoreError> {
        let counts: Vec<(String, i64)> = with_connection!(self.dal.database, |conn| {
            deferred_requests::table
                .group_by(deferred_requests::status)
                .select((deferred_requests::status, diesel::dsl::count_star()))
                .load(conn)
        })?;

        counts
            .into_iter()
            .map(|(status, count)| {
                status
                    .parse::<RequestStatus>()
                    .map(|status| (status, count))
                    .map_err(StoreError::InvalidData)
            })
            .collect()
    }
}
