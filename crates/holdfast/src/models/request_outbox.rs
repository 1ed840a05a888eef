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

//! Request Outbox Model
//!
//! The outbox is the durable work queue. An entry means "this request may
//! need processing once `available_at` has passed". Entries are deleted
//! when a worker dequeues them; the request row, not the outbox, remains
//! the source of truth for whether work is actually due.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deferred_request::RequestId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub request_id: RequestId,
    /// Earliest time a worker may pick the entry up
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
