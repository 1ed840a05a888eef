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

//! Work distribution abstraction for waking idle workers.
//!
//! Workers that find the queue empty park on a [`WorkDistributor`] until
//! either new work is announced or a poll interval elapses. The poll
//! fallback covers work that appears without an in-process announcement:
//! retries whose backoff has expired, entries written by another process,
//! or entries restored by the reconciler.
//!
//! ```rust,ignore
//! use holdfast::dispatcher::{PollingDistributor, WorkDistributor};
//!
//! let distributor = PollingDistributor::new();
//!
//! loop {
//!     distributor.wait_for_work().await;
//!     while let Some(delivery) = queue.dequeue().await? {
//!         processor.process(delivery.request_id).await;
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Trait for abstracting work notification mechanisms.
#[async_trait]
pub trait WorkDistributor: Send + Sync {
    /// Wait until work might be available, or timeout.
    ///
    /// The caller should attempt to dequeue after this returns and must
    /// handle the case where nothing is actually available.
    async fn wait_for_work(&self);

    /// Announces that work was just enqueued.
    fn work_available(&self);

    /// Signals that the distributor should stop waiting and shutdown.
    ///
    /// After calling this, `wait_for_work` returns promptly.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}

/// Work distributor using in-process notification with periodic polling.
#[derive(Debug, Clone)]
pub struct PollingDistributor {
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl PollingDistributor {
    /// Default poll interval
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Creates a new distributor with the default poll interval (500ms).
    pub fn new() -> Self {
        Self::with_poll_interval(Self::DEFAULT_POLL_INTERVAL)
    }

    /// Creates a new distributor with a custom poll interval.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for PollingDistributor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkDistributor for PollingDistributor {
    async fn wait_for_work(&self) {
        if self.is_shutdown() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {
                debug!("Poll interval elapsed");
            }
            _ = self.notify.notified() => {
                debug!("Woke from work notification");
            }
        }
    }

    fn work_available(&self) {
        // notify_one keeps a permit when nobody is parked yet, so a worker
        // about to wait still sees the announcement.
        self.notify.notify_one();
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
