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

//! JSON response envelope and HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use holdfast::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// What a response body describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    RequestCreated,
    Succeeded,
    Failed,
    SignalAccepted,
    SignalIgnored,
    Error,
}

/// Body of every JSON response: `{"status": ..., "error": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn new(status: ResponseKind, payload: Value) -> Self {
        Self {
            status,
            error: None,
            payload: Some(payload),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// An error rendered as an `error` envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "request not found")
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            EngineError::UpstreamUnavailable(msg) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            EngineError::NotFound => Self::not_found(),
            EngineError::Unauthorized => Self::unauthorized(),
            EngineError::TerminalExecution(msg) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
            EngineError::StaleSignal(correlation_id) => Self::new(
                StatusCode::NOT_FOUND,
                format!("unknown upload '{}'", correlation_id),
            ),
            EngineError::Store(_) | EngineError::Queue(_) => {
                error!(error = %err, "Internal error while handling request");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Envelope {
            status: ResponseKind::Error,
            error: Some(self.message),
            payload: None,
        }
        .into_response_with(self.status)
    }
}
