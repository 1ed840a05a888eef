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

//! Error types shared across the engine.
//!
//! `StoreError` covers everything that can go wrong while talking to the
//! database. `EngineError` is the taxonomy exposed to callers of the issuer,
//! dispatcher and status service.

use thiserror::Error;

/// Errors raised by the data access layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to obtain a pooled connection or run a closure on it.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A diesel query failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A persisted row could not be turned back into a domain value.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Migrations could not be applied.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The connection string did not name a backend this build supports.
    #[error("Unsupported database URL '{0}'")]
    UnsupportedBackend(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller input was rejected before anything was persisted.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The upload service could not issue a slot.
    #[error("Upload service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The request does not exist or belongs to another principal.
    #[error("Request not found")]
    NotFound,

    /// No authenticated principal was supplied.
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend rejected the request; it was not retried.
    #[error("Execution failed: {0}")]
    TerminalExecution(String),

    /// A completion signal referenced an unknown correlation id.
    #[error("No request matches upload correlation id '{0}'")]
    StaleSignal(String),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The work queue failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Errors returned by a [`WorkQueue`](crate::queue::WorkQueue).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by an [`ExecutionBackend`](crate::backend::ExecutionBackend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Transient failure; the request may be attempted again.
    #[error("retryable: {0}")]
    Retryable(String),

    /// Permanent failure; the request must not be attempted again.
    #[error("terminal: {0}")]
    Terminal(String),
}

impl BackendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Retryable(_))
    }

    /// The message without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            BackendError::Retryable(msg) | BackendError::Terminal(msg) => msg,
        }
    }
}

/// Errors returned by an [`UploadService`](crate::upload::UploadService).
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload service request failed: {0}")]
    Request(String),

    #[error("Upload service returned an invalid slot: {0}")]
    InvalidSlot(String),
}
