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

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use holdfast::{EngineError, RequestId, SlotKind};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::error::{ApiError, Envelope, ResponseKind};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    /// `file` (default) or `url`.
    #[serde(default)]
    source: SlotKind,
}

/// `POST /api/v1/requests[?source=url]`: stores the body and returns an
/// upload slot.
pub async fn create_request(
    State(state): State<AppState>,
    Principal(owner): Principal,
    Query(params): Query<CreateParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let created = state
        .engine
        .issuer()
        .create_with_kind(&owner, body.to_vec(), params.source)
        .await?;

    Ok(Envelope::new(
        ResponseKind::RequestCreated,
        json!({
            "request_id": created.request_id,
            "upload_kind": params.source,
            "upload_location": created.upload_location,
            "upload_token": created.upload_token,
        }),
    )
    .into_response_with(StatusCode::CREATED))
}

/// `GET /api/v1/requests/{id}`: 204 while in flight, 200 once terminal.
pub async fn get_request(
    State(state): State<AppState>,
    Principal(owner): Principal,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let request_id: RequestId = id.parse().map_err(|_| ApiError::not_found())?;
    let view = state.engine.status().get(&owner, request_id).await?;
    let status = view.status;

    match view.into_outcome() {
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(Some(result)) => {
            let mut payload = json!({
                "request_id": request_id,
                "status": status.as_str(),
            });
            // Results are opaque bytes; JSON ones are inlined.
            match serde_json::from_slice::<Value>(&result) {
                Ok(value) => payload["result"] = value,
                Err(_) => payload["result_base64"] = Value::String(BASE64.encode(&result)),
            }
            Ok(Envelope::new(ResponseKind::Succeeded, payload).into_response_with(StatusCode::OK))
        }
        Err(EngineError::TerminalExecution(reason)) => Ok(Envelope::new(
            ResponseKind::Failed,
            json!({
                "request_id": request_id,
                "status": status.as_str(),
            }),
        )
        .with_error(reason)
        .into_response_with(StatusCode::OK)),
        Err(e) => Err(e.into()),
    }
}
