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

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::state::AppState;

/// `GET /health`: queue depth and request counts per status.
pub async fn health(State(state): State<AppState>) -> Response {
    let depth = match state.engine.queue_depth().await {
        Ok(depth) => depth,
        Err(e) => return unavailable(e.to_string()),
    };
    let counts = match state.engine.dal().deferred_request().count_by_status().await {
        Ok(counts) => counts,
        Err(e) => return unavailable(e.to_string()),
    };

    let requests: Map<String, Value> = counts
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), json!(count)))
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "running": state.engine.is_running().await,
            "queue_depth": depth,
            "requests": requests,
        })),
    )
        .into_response()
}

fn unavailable(error: String) -> Response {
    warn!(%error, "Health check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable", "error": error })),
    )
        .into_response()
}

/// `GET /metrics`: Prometheus text exposition, 404 when disabled.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let Some(handle) = &state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Ok(depth) = state.engine.queue_depth().await {
        metrics::gauge!("holdfast_queue_depth").set(depth as f64);
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}
