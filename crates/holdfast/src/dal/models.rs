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

//! Row types for the shared diesel schema and their conversions to domain models.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::database::schema::{deferred_requests, request_events, request_outbox};
use crate::error::StoreError;
use crate::models::deferred_request::{DeferredRequest, RequestId, RequestStatus};
use crate::models::request_event::RequestEvent;
use crate::models::request_outbox::OutboxEntry;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = deferred_requests)]
pub struct DeferredRequestRow {
    pub id: String,
    pub owner_id: String,
    pub upload_correlation_id: String,
    pub payload: Vec<u8>,
    pub status: String,
    pub result: Option<Vec<u8>>,
    pub failure_reason: Option<String>,
    pub last_error: Option<String>,
    pub attempts: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = deferred_requests)]
pub struct NewDeferredRequestRow {
    pub id: String,
    pub owner_id: String,
    pub upload_correlation_id: String,
    pub payload: Vec<u8>,
    pub status: String,
    pub attempts: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Column changes applied by a status transition. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = deferred_requests)]
pub struct RequestChanges {
    pub status: Option<String>,
    pub result: Option<Vec<u8>>,
    pub failure_reason: Option<String>,
    pub last_error: Option<String>,
    pub attempts: Option<i32>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = request_events)]
pub struct RequestEventRow {
    pub id: String,
    pub request_id: String,
    pub event_type: String,
    pub event_data: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = request_events)]
pub struct NewRequestEventRow {
    pub id: String,
    pub request_id: String,
    pub event_type: String,
    pub event_data: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = request_outbox)]
pub struct OutboxRow {
    pub request_id: String,
    pub available_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

fn parse_request_id(raw: &str) -> Result<RequestId, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::InvalidData(format!("request id '{}': {}", raw, e)))
}

impl TryFrom<DeferredRequestRow> for DeferredRequest {
    type Error = StoreError;

    fn try_from(row: DeferredRequestRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<RequestStatus>()
            .map_err(StoreError::InvalidData)?;

        Ok(DeferredRequest {
            id: parse_request_id(&row.id)?,
            owner_id: row.owner_id,
            upload_correlation_id: row.upload_correlation_id,
            payload: row.payload,
            status,
            result: row.result,
            failure_reason: row.failure_reason,
            last_error: row.last_error,
            attempts: row.attempts,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        })
    }
}

impl TryFrom<RequestEventRow> for RequestEvent {
    type Error = StoreError;

    fn try_from(row: RequestEventRow) -> Result<Self, Self::Error> {
        let id = uuid::Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::InvalidData(format!("event id '{}': {}", row.id, e)))?;

        Ok(RequestEvent {
            id,
            request_id: parse_request_id(&row.request_id)?,
            event_type: row.event_type,
            event_data: row.event_data,
            created_at: row.created_at.and_utc(),
        })
    }
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = StoreError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(OutboxEntry {
            request_id: parse_request_id(&row.request_id)?,
            available_at: row.available_at.and_utc(),
            created_at: row.created_at.and_utc(),
        })
    }
}
