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

//! Request submission and upload handle issuance.

use std::sync::Arc;
use tracing::{info, warn};

use crate::dal::DAL;
use crate::error::EngineError;
use crate::models::deferred_request::{NewDeferredRequest, RequestId};
use crate::upload::{SlotKind, UploadService};

/// What the client receives after submitting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRequest {
    pub request_id: RequestId,
    /// Where the client uploads the file this request waits for.
    pub upload_location: String,
    pub upload_token: Option<String>,
}

/// Persists new requests and pairs each with an upload slot.
#[derive(Clone)]
pub struct UploadHandleIssuer {
    dal: DAL,
    uploads: Arc<dyn UploadService>,
    max_payload_bytes: usize,
}

impl UploadHandleIssuer {
    pub fn new(dal: DAL, uploads: Arc<dyn UploadService>, max_payload_bytes: usize) -> Self {
        Self {
            dal,
            uploads,
            max_payload_bytes,
        }
    }

    /// Validates the payload, reserves a file upload slot and stores the
    /// request in `Received`.
    ///
    /// Nothing is persisted unless the upload service issued a slot.
    pub async fn create(
        &self,
        owner_id: &str,
        payload: Vec<u8>,
    ) -> Result<CreatedRequest, EngineError> {
        self.create_with_kind(owner_id, payload, SlotKind::File).await
    }

    /// Like [`create`](Self::create), for an upload of the given kind.
    pub async fn create_with_kind(
        &self,
        owner_id: &str,
        payload: Vec<u8>,
        kind: SlotKind,
    ) -> Result<CreatedRequest, EngineError> {
        if owner_id.is_empty() {
            return Err(EngineError::Unauthorized);
        }
        if payload.is_empty() {
            return Err(EngineError::Validation("payload is empty".to_string()));
        }
        if payload.len() > self.max_payload_bytes {
            return Err(EngineError::Validation(format!(
                "payload is {} bytes, limit is {}",
                payload.len(),
                self.max_payload_bytes
            )));
        }

        let slot = self
            .uploads
            .issue_upload_slot(owner_id, kind)
            .await
            .map_err(|e| {
                warn!(owner_id, error = %e, "Upload service refused slot");
                EngineError::UpstreamUnavailable(e.to_string())
            })?;

        let request = self
            .dal
            .deferred_request()
            .create(NewDeferredRequest {
                owner_id: owner_id.to_string(),
                upload_correlation_id: slot.correlation_id.clone(),
                payload,
            })
            .await?;

        metrics::counter!("holdfast_requests_created_total").increment(1);
        info!(
            request_id = %request.id,
            owner_id,
            correlation_id = %slot.correlation_id,
            ?kind,
            "Deferred request created"
        );

        Ok(CreatedRequest {
            request_id: request.id,
            upload_location: slot.location,
            upload_token: slot.token,
        })
    }
}
