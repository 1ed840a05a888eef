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

//! Claim, execute and record a single request.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::RetryPolicy;
use crate::backend::ExecutionBackend;
use crate::dal::{TransitionOutcome, DAL};
use crate::dispatcher::WorkDistributor;
use crate::error::{BackendError, StoreError};
use crate::models::deferred_request::{DeferredRequest, RequestId, RequestStatus};
use crate::queue::WorkQueue;

/// Attempts made to persist an outcome before leaving it to the reconciler.
const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_BACKOFF: Duration = Duration::from_millis(100);

/// What processing a signal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The request was not claimable; the signal was dropped.
    Skipped,
    Succeeded,
    Failed,
    /// A retryable failure sent the request back to the queue.
    RetryScheduled { delay: Duration },
    /// The request ran out of attempts.
    Exhausted,
    /// The store could not be reached; the request is left for the reconciler.
    Deferred,
}

/// Processes one request per call. Cheap to clone.
#[derive(Clone)]
pub struct RequestProcessor {
    dal: DAL,
    backend: Arc<dyn ExecutionBackend>,
    queue: Arc<dyn WorkQueue>,
    distributor: Arc<dyn WorkDistributor>,
    max_attempts: i32,
    execution_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl RequestProcessor {
    pub fn new(
        dal: DAL,
        backend: Arc<dyn ExecutionBackend>,
        queue: Arc<dyn WorkQueue>,
        distributor: Arc<dyn WorkDistributor>,
        max_attempts: i32,
        execution_timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            dal,
            backend,
            queue,
            distributor,
            max_attempts,
            execution_timeout,
            retry_policy,
        }
    }

    /// Handles one processing signal for `request_id`.
    ///
    /// Never fails: every outcome is either recorded on the request or
    /// logged. At most one backend call is made, and only after this call
    /// won the `Queued -> Executing` claim.
    pub async fn process(&self, request_id: RequestId) -> ProcessOutcome {
        let claimed = match self
            .dal
            .deferred_request()
            .claim(request_id, self.max_attempts)
            .await
        {
            Ok(TransitionOutcome::Applied(request)) => request,
            Ok(TransitionOutcome::NotApplied(request)) => {
                debug!(
                    %request_id,
                    status = %request.status,
                    "Request not claimable, dropping signal"
                );
                return ProcessOutcome::Skipped;
            }
            Ok(TransitionOutcome::Missing) => {
                warn!(%request_id, "Processing signal for unknown request");
                return ProcessOutcome::Skipped;
            }
            Err(e) => {
                error!(%request_id, error = %e, "Failed to claim request");
                self.resignal(request_id, self.retry_policy.delay_for(1)).await;
                return ProcessOutcome::Deferred;
            }
        };

        if claimed.status == RequestStatus::Failed {
            metrics::counter!("holdfast_requests_failed_total").increment(1);
            warn!(
                %request_id,
                attempts = claimed.attempts,
                reason = claimed.failure_reason.as_deref().unwrap_or_default(),
                "Request exhausted its attempts"
            );
            return ProcessOutcome::Exhausted;
        }

        info!(%request_id, attempt = claimed.attempts, "Executing request");
        let result = match tokio::time::timeout(
            self.execution_timeout,
            self.backend.execute(&claimed.payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Retryable(format!(
                "execution timed out after {:?}",
                self.execution_timeout
            ))),
        };

        match result {
            Ok(output) => self.record_success(&claimed, output).await,
            Err(BackendError::Terminal(reason)) => self.record_failure(&claimed, reason).await,
            Err(BackendError::Retryable(reason)) => self.record_retryable(&claimed, reason).await,
        }
    }

    async fn record_success(&self, request: &DeferredRequest, output: Vec<u8>) -> ProcessOutcome {
        let id = request.id;
        let stored = persist(|| {
            let output = output.clone();
            async move { self.dal.deferred_request().mark_succeeded(id, output).await }
        })
        .await;

        match stored {
            Ok(outcome) if outcome.is_applied() => {
                metrics::counter!("holdfast_requests_succeeded_total").increment(1);
                info!(request_id = %id, attempt = request.attempts, "Request succeeded");
                ProcessOutcome::Succeeded
            }
            Ok(outcome) => {
                warn!(
                    request_id = %id,
                    status = ?outcome.request().map(|r| r.status),
                    "Request moved while executing; result discarded"
                );
                ProcessOutcome::Skipped
            }
            Err(e) => {
                error!(
                    request_id = %id,
                    error = %e,
                    "Failed to record result; request left Executing"
                );
                ProcessOutcome::Deferred
            }
        }
    }

    async fn record_failure(&self, request: &DeferredRequest, reason: String) -> ProcessOutcome {
        let id = request.id;
        let stored = persist(|| {
            let reason = reason.clone();
            async move { self.dal.deferred_request().mark_failed(id, reason).await }
        })
        .await;

        match stored {
            Ok(outcome) if outcome.is_applied() => {
                metrics::counter!("holdfast_requests_failed_total").increment(1);
                warn!(request_id = %id, attempt = request.attempts, %reason, "Request failed");
                ProcessOutcome::Failed
            }
            Ok(_) => ProcessOutcome::Skipped,
            Err(e) => {
                error!(
                    request_id = %id,
                    error = %e,
                    "Failed to record failure; request left Executing"
                );
                ProcessOutcome::Deferred
            }
        }
    }

    async fn record_retryable(&self, request: &DeferredRequest, reason: String) -> ProcessOutcome {
        let id = request.id;

        if request.attempts >= self.max_attempts {
            return match self.record_failure(request, reason).await {
                ProcessOutcome::Failed => ProcessOutcome::Exhausted,
                other => other,
            };
        }

        let delay = self.retry_policy.delay_for(request.attempts);
        let retry_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        let stored = persist(|| {
            let reason = reason.clone();
            async move {
                self.dal
                    .deferred_request()
                    .requeue_for_retry(id, reason, retry_at)
                    .await
            }
        })
        .await;

        match stored {
            Ok(outcome) if outcome.is_applied() => {
                metrics::counter!("holdfast_requests_retried_total").increment(1);
                info!(
                    request_id = %id,
                    attempt = request.attempts,
                    ?delay,
                    %reason,
                    "Retryable failure, request requeued"
                );
                self.resignal(id, delay).await;
                ProcessOutcome::RetryScheduled { delay }
            }
            Ok(_) => ProcessOutcome::Skipped,
            Err(e) => {
                error!(
                    request_id = %id,
                    error = %e,
                    "Failed to requeue request; request left Executing"
                );
                ProcessOutcome::Deferred
            }
        }
    }

    /// Best-effort enqueue; a lost signal is recovered by the reconciler.
    async fn resignal(&self, request_id: RequestId, delay: Duration) {
        match self.queue.enqueue_after(request_id, delay).await {
            Ok(()) if delay.is_zero() => self.distributor.work_available(),
            Ok(()) => {}
            Err(e) => warn!(
                %request_id,
                error = %e,
                "Failed to enqueue processing signal; leaving request for reconciliation"
            ),
        }
    }
}

async fn persist<F, Fut>(mut write: F) -> Result<TransitionOutcome, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TransitionOutcome, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match write().await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if attempt < PERSIST_ATTEMPTS => {
                warn!(attempt, error = %e, "Store write failed, retrying");
                tokio::time::sleep(PERSIST_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
