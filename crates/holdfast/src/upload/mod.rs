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

//! Upload slot issuance.
//!
//! The upload service itself is external. The engine only needs a slot:
//! a correlation id that the service will quote when it later reports the
//! upload as complete, a location the client uploads to, and a token the
//! upload service can check before accepting the upload.

mod token;

pub use token::{TokenError, TokenSigner, TokenVerifier, UploadTokenClaims};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::UploadError;

/// Where the uploaded file comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// The client sends the file body to the upload location.
    #[default]
    File,
    /// The client hands the upload service a remote URL to fetch.
    Url,
}

impl SlotKind {
    /// Path segment under the upload service base URL.
    pub fn path_segment(&self) -> &'static str {
        match self {
            SlotKind::File => "uploads",
            SlotKind::Url => "urls",
        }
    }
}

/// An upload location reserved for one deferred request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    /// Identifier the upload service echoes back in its completion signal.
    pub correlation_id: String,
    /// Where the client should send the file.
    pub location: String,
    /// Credential the client presents to the upload service, if it uses one.
    pub token: Option<String>,
}

/// Source of upload slots.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn issue_upload_slot(
        &self,
        owner_id: &str,
        kind: SlotKind,
    ) -> Result<UploadSlot, UploadError>;
}

/// Issues slots under a fixed upload service base URL.
///
/// Each slot gets a fresh UUID correlation id, a location of
/// `{base_url}/{uploads|urls}/{correlation_id}` and an upload token signed
/// by `signer`. No network call is made; the upload service verifies the
/// token against the published public key and reports completion by
/// correlation id.
#[derive(Debug, Clone)]
pub struct UrlUploadService {
    base_url: Url,
    signer: TokenSigner,
}

impl UrlUploadService {
    pub fn new(base_url: &str, signer: TokenSigner) -> Result<Self, UploadError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| UploadError::InvalidSlot(format!("base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(UploadError::InvalidSlot(format!(
                "base url '{}' cannot have path segments",
                base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { base_url, signer })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Verifier matching the key this service signs tokens with.
    pub fn verifier(&self) -> TokenVerifier {
        self.signer.verifier()
    }
}

#[async_trait]
impl UploadService for UrlUploadService {
    async fn issue_upload_slot(
        &self,
        owner_id: &str,
        kind: SlotKind,
    ) -> Result<UploadSlot, UploadError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let location = self
            .base_url
            .join(&format!("{}/{}", kind.path_segment(), correlation_id))
            .map_err(|e| UploadError::InvalidSlot(e.to_string()))?;
        let token = self
            .signer
            .issue(owner_id, &correlation_id, kind, Utc::now())
            .map_err(|e| UploadError::InvalidSlot(e.to_string()))?;

        tracing::debug!(owner_id, correlation_id, ?kind, "Issued upload slot");

        Ok(UploadSlot {
            correlation_id,
            location: location.to_string(),
            token: Some(token),
        })
    }
}
