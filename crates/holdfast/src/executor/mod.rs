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

//! Request execution.
//!
//! The [`WorkerPool`] runs a fixed number of workers that pull processing
//! signals off the work queue and hand them to a [`RequestProcessor`]. The
//! processor claims the request, calls the backend once, and records the
//! outcome.

mod processor;
mod retry;
mod worker_pool;

pub use processor::{ProcessOutcome, RequestProcessor};
pub use retry::RetryPolicy;
pub use worker_pool::WorkerPool;
