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

//! Outbox-table backed work queue.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use super::{Delivery, WorkQueue};
use crate::dal::DAL;
use crate::error::QueueError;
use crate::models::deferred_request::RequestId;

/// Work queue stored in the `request_outbox` table of the request store.
///
/// Keeping the queue in the same database as the requests means a signal
/// survives restarts, and several engine processes sharing one database
/// also share one queue.
#[derive(Clone, Debug)]
pub struct OutboxQueue {
    dal: DAL,
}

impl OutboxQueue {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }
}

#[async_trait]
impl WorkQueue for OutboxQueue {
    async fn enqueue_after(
        &self,
        request_id: RequestId,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| QueueError::Unavailable(format!("invalid delay: {}", e)))?;
        let available_at = Utc::now() + delay;

        let inserted = self
            .dal
            .request_outbox()
            .insert(request_id, available_at)
            .await?;

        if !inserted {
            debug!(%request_id, "Request already has a pending queue entry");
        }
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        let entry = self.dal.request_outbox().take_next(Utc::now()).await?;
        Ok(entry.map(|entry| Delivery {
            request_id: entry.request_id,
            available_at: entry.available_at,
        }))
    }

    async fn pending(&self) -> Result<i64, QueueError> {
        Ok(self.dal.request_outbox().count_pending().await?)
    }
}
