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

//! Status transitions for deferred requests.
//!
//! Each transition reads the row, decides whether the lifecycle permits the
//! change, and then updates it with a compare-and-swap on the observed
//! `status` and `attempts`. A zero row count means another writer got there
//! first, and the transition reports the row as it now stands. That
//! conditional update is the only serialization point between workers,
//! signal handlers and the reconciler, across processes as well as tasks.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde_json::json;
use tracing::debug;

use super::DeferredRequestDAL;
use crate::dal::models::{DeferredRequestRow, NewRequestEventRow, RequestChanges};
use crate::database::schema::{deferred_requests, request_events};
use crate::database::with_connection;
use crate::error::StoreError;
use crate::models::deferred_request::{DeferredRequest, RequestId, RequestStatus};
use crate::models::request_event::RequestEventType;

/// Result of a conditional status transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The row moved; carries the updated request.
    Applied(DeferredRequest),
    /// The row was not in an eligible state, or a concurrent writer moved it
    /// first. Carries the request as it currently stands.
    NotApplied(DeferredRequest),
    /// No row matched the key.
    Missing,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }

    pub fn request(&self) -> Option<&DeferredRequest> {
        match self {
            TransitionOutcome::Applied(request) | TransitionOutcome::NotApplied(request) => {
                Some(request)
            }
            TransitionOutcome::Missing => None,
        }
    }
}

enum RowKey {
    Id(String),
    Correlation(String),
}

/// What a transition writes once it has decided to proceed.
struct Plan {
    to: RequestStatus,
    event: RequestEventType,
    event_data: Option<serde_json::Value>,
    result: Option<Vec<u8>>,
    failure_reason: Option<String>,
    last_error: Option<String>,
    increment_attempts: bool,
}

impl Plan {
    fn new(to: RequestStatus, event: RequestEventType) -> Self {
        Self {
            to,
            event,
            event_data: None,
            result: None,
            failure_reason: None,
            last_error: None,
            increment_attempts: false,
        }
    }

    fn data(mut self, data: serde_json::Value) -> Self {
        self.event_data = Some(data);
        self
    }

    fn changes(&self, current: &DeferredRequest, now: NaiveDateTime) -> RequestChanges {
        RequestChanges {
            status: Some(self.to.as_str().to_string()),
            result: self.result.clone(),
            failure_reason: self.failure_reason.clone(),
            last_error: self.last_error.clone(),
            attempts: self.increment_attempts.then_some(current.attempts + 1),
            updated_at: Some(now),
        }
    }
}

impl<'a> DeferredRequestDAL<'a> {
    /// Records upload progress: `Received -> UploadInProgress`.
    pub async fn mark_upload_in_progress(
        &self,
        correlation_id: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        self.transition(RowKey::Correlation(correlation_id.to_string()), |current| {
            (current.status == RequestStatus::Received).then(|| {
                Plan::new(
                    RequestStatus::UploadInProgress,
                    RequestEventType::UploadProgressed,
                )
            })
        })
        .await
    }

    /// Makes a request eligible for execution once its upload is complete:
    /// `Received | UploadInProgress -> Queued`.
    pub async fn mark_queued(&self, correlation_id: &str) -> Result<TransitionOutcome, StoreError> {
        self.transition(RowKey::Correlation(correlation_id.to_string()), |current| {
            match current.status {
                RequestStatus::Received | RequestStatus::UploadInProgress => Some(Plan::new(
                    RequestStatus::Queued,
                    RequestEventType::RequestQueued,
                )),
                _ => None,
            }
        })
        .await
    }

    /// Claims a queued request for execution.
    ///
    /// While `attempts < max_attempts` the request moves to `Executing` and
    /// its attempt count is incremented. A queued request that has already
    /// used every attempt moves straight to `Failed` with its last recorded
    /// error. Anything other than `Queued` is left untouched.
    pub async fn claim(
        &self,
        id: RequestId,
        max_attempts: i32,
    ) -> Result<TransitionOutcome, StoreError> {
        self.transition(RowKey::Id(id.to_string()), move |current| {
            if current.status != RequestStatus::Queued {
                return None;
            }

            if current.attempts < max_attempts {
                let mut plan = Plan::new(RequestStatus::Executing, RequestEventType::RequestClaimed)
                    .data(json!({ "attempt": current.attempts + 1 }));
                plan.increment_attempts = true;
                Some(plan)
            } else {
                let reason = current.last_error.clone().unwrap_or_else(|| {
                    format!("retries exhausted after {} attempts", current.attempts)
                });
                let mut plan = Plan::new(RequestStatus::Failed, RequestEventType::RequestFailed)
                    .data(json!({ "reason": reason, "exhausted": true }));
                plan.failure_reason = Some(reason);
                Some(plan)
            }
        })
        .await
    }

    /// Stores the backend result: `Executing -> Succeeded`.
    pub async fn mark_succeeded(
        &self,
        id: RequestId,
        result: Vec<u8>,
    ) -> Result<TransitionOutcome, StoreError> {
        self.transition(RowKey::Id(id.to_string()), move |current| {
            if current.status != RequestStatus::Executing {
                return None;
            }
            let mut plan = Plan::new(RequestStatus::Succeeded, RequestEventType::RequestSucceeded)
                .data(json!({ "attempt": current.attempts, "result_bytes": result.len() }));
            plan.result = Some(result);
            Some(plan)
        })
        .await
    }

    /// Records a permanent failure: `Executing -> Failed`.
    pub async fn mark_failed(
        &self,
        id: RequestId,
        reason: String,
    ) -> Result<TransitionOutcome, StoreError> {
        self.transition(RowKey::Id(id.to_string()), move |current| {
            if current.status != RequestStatus::Executing {
                return None;
            }
            let mut plan = Plan::new(RequestStatus::Failed, RequestEventType::RequestFailed)
                .data(json!({ "attempt": current.attempts, "reason": reason }));
            plan.failure_reason = Some(reason);
            Some(plan)
        })
        .await
    }

    /// Sends a request back to the queue after a retryable failure:
    /// `Executing -> Queued`, remembering the error.
    pub async fn requeue_for_retry(
        &self,
        id: RequestId,
        error: String,
        retry_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        self.transition(RowKey::Id(id.to_string()), move |current| {
            if current.status != RequestStatus::Executing {
                return None;
            }
            let mut plan = Plan::new(RequestStatus::Queued, RequestEventType::RetryScheduled)
                .data(json!({
                    "attempt": current.attempts,
                    "error": error,
                    "retry_at": retry_at.to_rfc3339(),
                }));
            plan.last_error = Some(error);
            Some(plan)
        })
        .await
    }

    /// Returns an execution abandoned by its worker to the queue:
    /// `Executing -> Queued`, only if the row has not changed since `cutoff`.
    pub async fn reclaim_stale(
        &self,
        id: RequestId,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        self.transition(RowKey::Id(id.to_string()), move |current| {
            if current.status != RequestStatus::Executing || current.updated_at >= cutoff {
                return None;
            }
            let mut plan = Plan::new(RequestStatus::Queued, RequestEventType::RequestReclaimed)
                .data(json!({
                    "attempt": current.attempts,
                    "stale_since": current.updated_at.to_rfc3339(),
                }));
            plan.last_error = Some(format!(
                "execution abandoned during attempt {}",
                current.attempts
            ));
            Some(plan)
        })
        .await
    }

    async fn transition<F>(&self, key: RowKey, decide: F) -> Result<TransitionOutcome, StoreError>
    where
        F: FnOnce(&DeferredRequest) -> Option<Plan> + Send + 'static,
    {
        let outcome = with_connection!(self.dal.database, |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let row: Option<DeferredRequestRow> = match &key {
                    RowKey::Id(id) => deferred_requests::table
                        .find(id.clone())
                        .select(DeferredRequestRow::as_select())
                        .first(conn)
                        .optional()?,
                    RowKey::Correlation(correlation_id) => deferred_requests::table
                        .filter(deferred_requests::upload_correlation_id.eq(correlation_id.clone()))
                        .select(DeferredRequestRow::as_select())
                        .first(conn)
                        .optional()?,
                };
                let Some(row) = row else {
                    return Ok(TransitionOutcome::Missing);
                };

                let current = DeferredRequest::try_from(row)?;
                let plan = match decide(&current) {
                    Some(plan) if current.status.can_transition_to(plan.to) => plan,
                    _ => return Ok(TransitionOutcome::NotApplied(current)),
                };

                let now = Utc::now().naive_utc();
                let id = current.id.to_string();
                let changes = plan.changes(&current, now);

                let updated = diesel::update(
                    deferred_requests::table
                        .filter(deferred_requests::id.eq(id.clone()))
                        .filter(deferred_requests::status.eq(current.status.as_str()))
                        .filter(deferred_requests::attempts.eq(current.attempts)),
                )
                .set(&changes)
                .execute(conn)?;

                if updated == 0 {
                    let row: DeferredRequestRow = deferred_requests::table
                        .find(id)
                        .select(DeferredRequestRow::as_select())
                        .first(conn)?;
                    return Ok(TransitionOutcome::NotApplied(row.try_into()?));
                }

                let event = NewRequestEventRow {
                    id: uuid::Uuid::new_v4().to_string(),
                    request_id: id.clone(),
                    event_type: plan.event.as_str().to_string(),
                    event_data: plan.event_data.map(|data| data.to_string()),
                    created_at: now,
                };
                diesel::insert_into(request_events::table)
                    .values(&event)
                    .execute(conn)?;

                let row: DeferredRequestRow = deferred_requests::table
                    .find(id)
                    .select(DeferredRequestRow::as_select())
                    .first(conn)?;
                Ok(TransitionOutcome::Applied(row.try_into()?))
            })
        })?;

        if let TransitionOutcome::NotApplied(request) = &outcome {
            debug!(
                request_id = %request.id,
                status = %request.status,
                "Transition not applied"
            );
        }

        Ok(outcome)
    }
}
