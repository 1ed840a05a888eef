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

//! # Holdfast
//!
//! Holdfast runs API requests that cannot execute until a large file has
//! been uploaded out-of-band. A client submits the request and gets an
//! upload location back. The request is persisted, waits for the upload
//! service to report completion, and is then executed exactly once by a
//! pool of workers. The client polls for the result.
//!
//! ## Components
//!
//! - [`issuer::UploadHandleIssuer`] stores new requests and pairs each with an upload slot
//! - [`dispatcher::Dispatcher`] turns upload completion signals into queued work
//! - [`executor::WorkerPool`] claims queued requests and calls the [`backend::ExecutionBackend`]
//! - [`status::StatusService`] answers owner-scoped status polls
//! - [`reconciler::Reconciler`] repairs requests whose signal or worker was lost
//! - [`engine::Engine`] wires all of the above to a [`Database`]
//!
//! ## Request lifecycle
//!
//! `Received -> [UploadInProgress] -> Queued -> Executing -> Succeeded | Failed`,
//! with `Executing -> Queued` for retries and reclaimed executions. See
//! [`models::deferred_request`] for the full transition table.
//!
//! All transitions are conditional updates in the request store, so at most
//! one worker ever executes a given request per claim regardless of how many
//! duplicate signals arrive.

pub mod backend;
pub mod config;
pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod executor;
pub mod issuer;
pub mod logging;
pub mod models;
pub mod queue;
pub mod reconciler;
pub mod status;
pub mod upload;

pub use backend::{ExecutionBackend, JsonRpcBackend};
pub use config::{EngineConfig, EngineConfigBuilder, ReconcilerConfig};
pub use database::Database;
pub use dispatcher::SignalOutcome;
pub use engine::{Engine, EngineBuilder};
pub use error::{BackendError, EngineError, QueueError, StoreError, UploadError};
pub use executor::RetryPolicy;
pub use issuer::CreatedRequest;
pub use logging::init_logging;
pub use models::deferred_request::{DeferredRequest, RequestId, RequestStatus};
pub use status::RequestStatusView;
pub use upload::{
    SlotKind, TokenSigner, TokenVerifier, UploadService, UploadSlot, UploadTokenClaims,
    UrlUploadService,
};
