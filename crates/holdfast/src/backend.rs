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

//! Execution backends.
//!
//! A backend performs the actual side effect a deferred request stands for.
//! It receives the stored payload verbatim and returns the bytes to record
//! as the request's result. Failures are classified as retryable or
//! terminal; the worker pool decides what to do with each.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

use crate::error::BackendError;

/// Executes a stored request payload.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, payload: &[u8]) -> Result<Vec<u8>, BackendError>;
}

/// Forwards payloads as JSON-RPC calls over HTTP.
///
/// Connection failures, timeouts, `429` and `5xx` responses are retryable.
/// Other non-success statuses, unparseable bodies and JSON-RPC `error`
/// objects are terminal. On success the JSON-RPC `result` is stored.
#[derive(Debug, Clone)]
pub struct JsonRpcBackend {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// `Some(Value::Null)` for `"result": null`, `None` when the key is absent.
    #[serde(default, deserialize_with = "present")]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcBackend {
    pub fn new(endpoint: Url, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn classify_status(status: StatusCode, body: &str) -> BackendError {
        let detail = format!("{} from backend: {}", status, truncate(body, 256));
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            BackendError::Retryable(detail)
        } else {
            BackendError::Terminal(detail)
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl ExecutionBackend for JsonRpcBackend {
    async fn execute(&self, payload: &[u8]) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    BackendError::Terminal(format!("invalid backend request: {}", e))
                } else {
                    BackendError::Retryable(format!("backend unreachable: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Retryable(format!("reading backend response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        let parsed: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            BackendError::Terminal(format!("invalid JSON-RPC response: {}", e))
        })?;

        if let Some(error) = parsed.error {
            return Err(BackendError::Terminal(format!(
                "JSON-RPC error {}: {}",
                error.code, error.message
            )));
        }

        match parsed.result {
            Some(result) => serde_json::to_vec(&result)
                .map_err(|e| BackendError::Terminal(format!("encoding result: {}", e))),
            None => Err(BackendError::Terminal(
                "JSON-RPC response carried neither result nor error".to_string(),
            )),
        }
    }
}
