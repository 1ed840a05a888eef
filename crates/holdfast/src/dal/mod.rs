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

//! Data access layer with runtime backend selection.
//!
//! The [`DAL`] hands out short-lived per-table accessors that borrow it:
//!
//! ```rust,ignore
//! let dal = DAL::new(database);
//! let request = dal.deferred_request().create(new_request).await?;
//! let events = dal.request_event().list_for_request(request.id).await?;
//! ```
//!
//! Every status transition is transactional: the row update and its
//! `request_events` entry are committed together or not at all.

pub mod deferred_request;
pub mod models;
pub mod request_event;
pub mod request_outbox;

pub use deferred_request::{DeferredRequestDAL, TransitionOutcome};
pub use request_event::RequestEventDAL;
pub use request_outbox::RequestOutboxDAL;

use crate::database::Database;

/// Entry point to all store operations.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn deferred_request(&self) -> DeferredRequestDAL<'_> {
        DeferredRequestDAL::new(self)
    }

    pub fn request_event(&self) -> RequestEventDAL<'_> {
        RequestEventDAL::new(self)
    }

    pub fn request_outbox(&self) -> RequestOutboxDAL<'_> {
        RequestOutboxDAL::new(self)
    }
}
