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

//! Upload service callbacks. Duplicate and unknown signals are answered with
//! 200 so the upload service does not keep retrying them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use holdfast::{EngineError, SignalOutcome};
use serde_json::json;

use crate::auth::SignalCaller;
use crate::error::{ApiError, Envelope, ResponseKind};
use crate::state::AppState;

pub async fn upload_complete(
    State(state): State<AppState>,
    _caller: SignalCaller,
    Path(correlation_id): Path<String>,
) -> Result<Response, ApiError> {
    signal_response(
        state
            .engine
            .dispatcher()
            .on_upload_complete(&correlation_id)
            .await,
    )
}

pub async fn upload_progress(
    State(state): State<AppState>,
    _caller: SignalCaller,
    Path(correlation_id): Path<String>,
) -> Result<Response, ApiError> {
    signal_response(
        state
            .engine
            .dispatcher()
            .on_upload_progress(&correlation_id)
            .await,
    )
}

fn signal_response(outcome: Result<SignalOutcome, EngineError>) -> Result<Response, ApiError> {
    let envelope = match outcome {
        Ok(SignalOutcome::Queued(request_id)) | Ok(SignalOutcome::ProgressRecorded(request_id)) => {
            Envelope::new(
                ResponseKind::SignalAccepted,
                json!({ "request_id": request_id }),
            )
        }
        Ok(SignalOutcome::AlreadyProgressed { request_id, status }) => Envelope::new(
            ResponseKind::SignalIgnored,
            json!({ "request_id": request_id, "status": status.as_str() }),
        ),
        Err(EngineError::StaleSignal(correlation_id)) => Envelope::new(
            ResponseKind::SignalIgnored,
            json!({ "correlation_id": correlation_id }),
        )
        .with_error("no request matches this upload"),
        Err(e) => return Err(e.into()),
    };

    Ok(envelope.into_response_with(StatusCode::OK))
}
