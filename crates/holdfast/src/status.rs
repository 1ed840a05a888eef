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

//! Owner-scoped, read-only status lookup.

use chrono::{DateTime, Utc};

use crate::dal::DAL;
use crate::error::EngineError;
use crate::models::deferred_request::{RequestId, RequestStatus};

/// The client-visible view of a request.
///
/// `result` is only present once `Succeeded` and `failure_reason` only once
/// `Failed`. Internal retry bookkeeping is never included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub result: Option<Vec<u8>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestStatusView {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Collapses the view into the outcome a client acts on.
    ///
    /// `Ok(None)` while the request is still in flight, `Ok(Some(result))`
    /// once it succeeded and [`EngineError::TerminalExecution`] once it failed.
    pub fn into_outcome(self) -> Result<Option<Vec<u8>>, EngineError> {
        match self.status {
            RequestStatus::Succeeded => Ok(Some(self.result.unwrap_or_default())),
            RequestStatus::Failed => Err(EngineError::TerminalExecution(
                self.failure_reason.unwrap_or_default(),
            )),
            _ => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct StatusService {
    dal: DAL,
}

impl StatusService {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    /// Returns the status of `request_id` as seen by `owner_id`.
    ///
    /// Missing requests and requests owned by someone else are both
    /// [`EngineError::NotFound`].
    pub async fn get(
        &self,
        owner_id: &str,
        request_id: RequestId,
    ) -> Result<RequestStatusView, EngineError> {
        if owner_id.is_empty() {
            return Err(EngineError::Unauthorized);
        }

        let request = self
            .dal
            .deferred_request()
            .get_for_owner(owner_id, request_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let (result, failure_reason) = match request.status {
            RequestStatus::Succeeded => (request.result, None),
            RequestStatus::Failed => (None, request.failure_reason),
            _ => (None, None),
        };

        Ok(RequestStatusView {
            request_id: request.id,
            status: request.status,
            result,
            failure_reason,
            created_at: request.created_at,
            updated_at: request.updated_at,
        })
    }
}
