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

//! Background repair of requests that would otherwise never finish.
//!
//! Two situations leave a request stuck:
//!
//! - It is `Queued` but its processing signal was lost (the enqueue after
//!   the transition failed, or a worker dequeued it and then hit a store
//!   error before claiming).
//! - It is `Executing` but the worker that claimed it died or was aborted
//!   during shutdown.
//!
//! Each sweep re-sends signals for `Queued` requests that have not changed
//! for `queued_stale_after`, and returns `Executing` requests that have not
//! changed for `executing_stale_after` to the queue. A reclaimed request
//! keeps its attempt count, so a request whose worker keeps dying still
//! runs out of attempts.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ReconcilerConfig;
use crate::dal::{TransitionOutcome, DAL};
use crate::dispatcher::WorkDistributor;
use crate::error::EngineError;
use crate::models::deferred_request::RequestStatus;
use crate::queue::WorkQueue;

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// `Executing` requests returned to `Queued`
    pub reclaimed: usize,
    /// `Queued` requests whose signal was re-sent
    pub resignaled: usize,
}

#[derive(Clone)]
pub struct Reconciler {
    dal: DAL,
    queue: Arc<dyn WorkQueue>,
    distributor: Arc<dyn WorkDistributor>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        dal: DAL,
        queue: Arc<dyn WorkQueue>,
        distributor: Arc<dyn WorkDistributor>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            dal,
            queue,
            distributor,
            config,
        }
    }

    /// Runs one reconciliation pass.
    pub async fn sweep(&self) -> Result<SweepReport, EngineError> {
        let mut report = SweepReport::default();
        let now = Utc::now();
        let requests = self.dal.deferred_request();

        let executing_cutoff = cutoff(now, self.config.executing_stale_after);
        let stale_executing = requests
            .list_stale(
                RequestStatus::Executing,
                executing_cutoff,
                self.config.batch_size,
            )
            .await?;

        for request in stale_executing {
            match requests.reclaim_stale(request.id, executing_cutoff).await? {
                TransitionOutcome::Applied(reclaimed) => {
                    warn!(
                        request_id = %reclaimed.id,
                        attempts = reclaimed.attempts,
                        "Reclaimed abandoned execution"
                    );
                    self.queue.enqueue(reclaimed.id).await?;
                    report.reclaimed += 1;
                }
                _ => debug!(request_id = %request.id, "Execution finished before reclaim"),
            }
        }

        let queued_cutoff = cutoff(now, self.config.queued_stale_after);
        let stale_queued = requests
            .list_stale(RequestStatus::Queued, queued_cutoff, self.config.batch_size)
            .await?;

        for request in stale_queued {
            self.queue.enqueue(request.id).await?;
            report.resignaled += 1;
        }

        if report.reclaimed + report.resignaled > 0 {
            metrics::counter!("holdfast_requests_reclaimed_total")
                .increment(report.reclaimed as u64);
            self.distributor.work_available();
            info!(
                reclaimed = report.reclaimed,
                resignaled = report.resignaled,
                "Reconciliation sweep repaired requests"
            );
        }

        Ok(report)
    }

    /// Sweeps once immediately, then every `sweep_interval` until `shutdown`
    /// flips to `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!(error = %e, "Reconciliation sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Reconciler stopped");
        })
    }
}

fn cutoff(now: DateTime<Utc>, age: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
