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

//! Completion signal handling.
//!
//! The upload service reports progress and completion by correlation id.
//! The dispatcher turns those signals into status transitions and, when a
//! request becomes eligible, into a processing signal on the work queue.
//! Signals may be duplicated, reordered or refer to requests that no longer
//! exist; none of that is an error for the upload service.

pub mod work_distributor;

pub use work_distributor::{PollingDistributor, WorkDistributor};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dal::{TransitionOutcome, DAL};
use crate::error::EngineError;
use crate::models::deferred_request::{RequestId, RequestStatus};
use crate::queue::WorkQueue;

/// What a signal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The request moved to `Queued` and a processing signal was sent.
    Queued(RequestId),
    /// The request moved to `UploadInProgress`.
    ProgressRecorded(RequestId),
    /// The request was already past the point this signal would move it to.
    AlreadyProgressed {
        request_id: RequestId,
        status: RequestStatus,
    },
}

/// Handles upload service signals.
#[derive(Clone)]
pub struct Dispatcher {
    dal: DAL,
    queue: Arc<dyn WorkQueue>,
    distributor: Arc<dyn WorkDistributor>,
}

impl Dispatcher {
    pub fn new(
        dal: DAL,
        queue: Arc<dyn WorkQueue>,
        distributor: Arc<dyn WorkDistributor>,
    ) -> Self {
        Self {
            dal,
            queue,
            distributor,
        }
    }

    /// Handles an upload-complete signal.
    ///
    /// Unknown correlation ids yield [`EngineError::StaleSignal`] without
    /// touching any row. A request already queued, executing or finished is
    /// reported as [`SignalOutcome::AlreadyProgressed`] and is not enqueued
    /// again. If the transition succeeds but the enqueue fails, the request
    /// stays `Queued` and the reconciler re-sends its signal.
    pub async fn on_upload_complete(
        &self,
        correlation_id: &str,
    ) -> Result<SignalOutcome, EngineError> {
        match self.dal.deferred_request().mark_queued(correlation_id).await? {
            TransitionOutcome::Applied(request) => {
                metrics::counter!("holdfast_requests_queued_total").increment(1);
                info!(
                    request_id = %request.id,
                    correlation_id,
                    "Upload complete, request queued"
                );

                match self.queue.enqueue(request.id).await {
                    Ok(()) => self.distributor.work_available(),
                    Err(e) => {
                        metrics::counter!("holdfast_enqueue_failures_total").increment(1);
                        warn!(
                            request_id = %request.id,
                            error = %e,
                            "Failed to enqueue processing signal; leaving request for reconciliation"
                        );
                    }
                }

                Ok(SignalOutcome::Queued(request.id))
            }
            TransitionOutcome::NotApplied(request) => {
                debug!(
                    request_id = %request.id,
                    status = %request.status,
                    correlation_id,
                    "Duplicate completion signal ignored"
                );
                Ok(SignalOutcome::AlreadyProgressed {
                    request_id: request.id,
                    status: request.status,
                })
            }
            TransitionOutcome::Missing => {
                metrics::counter!("holdfast_stale_signals_total").increment(1);
                warn!(correlation_id, "Completion signal for unknown upload");
                Err(EngineError::StaleSignal(correlation_id.to_string()))
            }
        }
    }

    /// Handles an upload-progress signal: `Received -> UploadInProgress`.
    ///
    /// Purely informational; the request becomes eligible only on completion.
    pub async fn on_upload_progress(
        &self,
        correlation_id: &str,
    ) -> Result<SignalOutcome, EngineError> {
        match self
            .dal
            .deferred_request()
            .mark_upload_in_progress(correlation_id)
            .await?
        {
            TransitionOutcome::Applied(request) => {
                debug!(request_id = %request.id, correlation_id, "Upload in progress");
                Ok(SignalOutcome::ProgressRecorded(request.id))
            }
            TransitionOutcome::NotApplied(request) => Ok(SignalOutcome::AlreadyProgressed {
                request_id: request.id,
                status: request.status,
            }),
            TransitionOutcome::Missing => {
                metrics::counter!("holdfast_stale_signals_total").increment(1);
                Err(EngineError::StaleSignal(correlation_id.to_string()))
            }
        }
    }
}
