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

//! Deferred request model and its status state machine.
//!
//! A deferred request is created when a client submits a payload whose
//! execution has to wait for an out-of-band upload. Its lifecycle:
//!
//! ```text
//! Received         -> UploadInProgress   upload progress observed
//! Received         -> Queued             upload completed
//! UploadInProgress -> Queued             upload completed
//! Queued           -> Executing          claimed by a worker
//! Queued           -> Failed             attempts exhausted
//! Executing        -> Succeeded          backend call succeeded
//! Executing        -> Failed             terminal error, or retries exhausted
//! Executing        -> Queued             retryable error, or reclaimed after a crash
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque handle identifying a deferred request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Status of a deferred request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Persisted and waiting for the upload to start or finish.
    Received,
    /// The upload service reported progress.
    UploadInProgress,
    /// Eligible for execution; a processing signal has been enqueued.
    Queued,
    /// Claimed by a worker; a backend call is in flight.
    Executing,
    /// The backend call succeeded and the result is stored.
    Succeeded,
    /// The request failed permanently.
    Failed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Received,
        RequestStatus::UploadInProgress,
        RequestStatus::Queued,
        RequestStatus::Executing,
        RequestStatus::Succeeded,
        RequestStatus::Failed,
    ];

    /// Returns the string stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Received => "Received",
            RequestStatus::UploadInProgress => "UploadInProgress",
            RequestStatus::Queued => "Queued",
            RequestStatus::Executing => "Executing",
            RequestStatus::Succeeded => "Succeeded",
            RequestStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Succeeded | RequestStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `Executing -> Queued` covers both retry after a transient failure
    /// and reclaiming a request whose worker disappeared.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Received, UploadInProgress)
                | (Received, Queued)
                | (UploadInProgress, Queued)
                | (Queued, Executing)
                | (Queued, Failed)
                | (Executing, Succeeded)
                | (Executing, Failed)
                | (Executing, Queued)
        )
    }

    /// The statuses from which `next` may be entered.
    pub fn predecessors_of(next: RequestStatus) -> Vec<RequestStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown request status '{}'", s))
    }
}

/// A persisted deferred request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredRequest {
    pub id: RequestId,
    pub owner_id: String,
    pub upload_correlation_id: String,
    /// The client's request body, stored verbatim.
    pub payload: Vec<u8>,
    pub status: RequestStatus,
    /// Backend result; only set once `Succeeded`.
    pub result: Option<Vec<u8>>,
    /// Terminal error; only set once `Failed`.
    pub failure_reason: Option<String>,
    /// Most recent retryable error. Internal bookkeeping, never shown to clients.
    pub last_error: Option<String>,
    /// Number of times a worker has claimed this request.
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structure for creating a new deferred request.
#[derive(Debug, Clone)]
pub struct NewDeferredRequest {
    pub owner_id: String,
    pub upload_correlation_id: String,
    pub payload: Vec<u8>,
}
