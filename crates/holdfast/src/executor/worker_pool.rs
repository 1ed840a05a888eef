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

//! Fixed-size pool of workers draining the work queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RequestProcessor;
use crate::dispatcher::WorkDistributor;
use crate::queue::WorkQueue;

/// A running set of workers.
///
/// Each worker loops: dequeue a signal and process it, or park on the
/// distributor when the queue is empty. Dropping the pool without calling
/// [`shutdown`](Self::shutdown) stops each worker the next time it goes idle.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    distributor: Arc<dyn WorkDistributor>,
}

impl WorkerPool {
    /// Spawns `concurrency` workers on the current tokio runtime.
    pub fn start(
        processor: RequestProcessor,
        queue: Arc<dyn WorkQueue>,
        distributor: Arc<dyn WorkDistributor>,
        concurrency: usize,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..concurrency)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    processor.clone(),
                    queue.clone(),
                    distributor.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        info!(concurrency, "Worker pool started");

        Self {
            handles,
            shutdown_tx,
            distributor,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stops taking new work and waits up to `grace` for in-flight requests.
    ///
    /// Workers still busy after `grace` are aborted. Their requests stay
    /// `Executing` until the reconciler returns them to the queue.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        self.distributor.shutdown();

        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0usize;
        for mut handle in self.handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                aborted += 1;
            }
        }

        if aborted > 0 {
            warn!(aborted, "Workers aborted after shutdown grace period");
        }
        info!("Worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    processor: RequestProcessor,
    queue: Arc<dyn WorkQueue>,
    distributor: Arc<dyn WorkDistributor>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker_id, "Worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match queue.dequeue().await {
            Ok(Some(delivery)) => {
                let outcome = processor.process(delivery.request_id).await;
                debug!(worker_id, request_id = %delivery.request_id, ?outcome, "Processed signal");
                continue;
            }
            Ok(None) => {}
            Err(e) => warn!(worker_id, error = %e, "Failed to dequeue"),
        }

        tokio::select! {
            _ = distributor.wait_for_work() => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(worker_id, "Worker stopped");
}
