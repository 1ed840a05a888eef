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

//! Request Event Model
//!
//! Every status change of a deferred request is recorded as an append-only
//! event, written in the same transaction as the change itself. The event
//! log is the audit trail for debugging duplicate signals, retries and
//! reclaimed executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deferred_request::RequestId;

/// A recorded lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    pub id: uuid::Uuid,
    pub request_id: RequestId,
    /// The type of event (e.g. "request_created", "request_claimed")
    pub event_type: String,
    /// JSON-encoded details, when the event carries any
    pub event_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestEvent {
    /// Parses `event_type` back into the enum, if it is a known type.
    pub fn kind(&self) -> Option<RequestEventType> {
        RequestEventType::from_str(&self.event_type)
    }
}

/// Enumeration of request lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestEventType {
    /// A new deferred request was persisted
    RequestCreated,
    /// The upload service reported progress
    UploadProgressed,
    /// The upload finished and the request became eligible for execution
    RequestQueued,
    /// A worker claimed the request
    RequestClaimed,
    /// The backend call succeeded
    RequestSucceeded,
    /// The request failed permanently
    RequestFailed,
    /// A retryable failure sent the request back to the queue
    RetryScheduled,
    /// A stale execution was returned to the queue by the reconciler
    RequestReclaimed,
}

impl RequestEventType {
    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestEventType::RequestCreated => "request_created",
            RequestEventType::UploadProgressed => "upload_progressed",
            RequestEventType::RequestQueued => "request_queued",
            RequestEventType::RequestClaimed => "request_claimed",
            RequestEventType::RequestSucceeded => "request_succeeded",
            RequestEventType::RequestFailed => "request_failed",
            RequestEventType::RetryScheduled => "retry_scheduled",
            RequestEventType::RequestReclaimed => "request_reclaimed",
        }
    }

    /// Parses an event type from its string representation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "request_created" => Some(RequestEventType::RequestCreated),
            "upload_progressed" => Some(RequestEventType::UploadProgressed),
            "request_queued" => Some(RequestEventType::RequestQueued),
            "request_claimed" => Some(RequestEventType::RequestClaimed),
            "request_succeeded" => Some(RequestEventType::RequestSucceeded),
            "request_failed" => Some(RequestEventType::RequestFailed),
            "retry_scheduled" => Some(RequestEventType::RetryScheduled),
            "request_reclaimed" => Some(RequestEventType::RequestReclaimed),
            _ => None,
        }
    }
}
