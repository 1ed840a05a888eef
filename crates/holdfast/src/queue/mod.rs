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

//! Work queue abstraction.
//!
//! The queue carries processing signals ("request X may be ready") from the
//! dispatcher and the retry path to the worker pool. Delivery is
//! at-least-once and the queue is never the source of truth: a worker always
//! re-checks the request's status through a conditional claim before acting.

mod outbox;

pub use outbox::OutboxQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::QueueError;
use crate::models::deferred_request::RequestId;

/// A processing signal handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub request_id: RequestId,
    /// When the signal became eligible for delivery.
    pub available_at: DateTime<Utc>,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Signals that a request is ready now.
    async fn enqueue(&self, request_id: RequestId) -> Result<(), QueueError> {
        self.enqueue_after(request_id, Duration::ZERO).await
    }

    /// Signals that a request should be processed once `delay` has passed.
    async fn enqueue_after(&self, request_id: RequestId, delay: Duration)
        -> Result<(), QueueError>;

    /// Takes the next due signal, if any. Never blocks waiting for work.
    async fn dequeue(&self) -> Result<Option<Delivery>, QueueError>;

    /// Number of signals waiting, due or not.
    async fn pending(&self) -> Result<i64, QueueError>;
}
