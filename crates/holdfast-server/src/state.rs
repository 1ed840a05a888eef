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

//! Shared handler state.

use holdfast::{Engine, TokenVerifier};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::auth::TokenAuthenticator;
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub auth: Arc<TokenAuthenticator>,
    pub signal_secret: Arc<str>,
    /// Checks the upload tokens the engine issues; its public key is served
    /// to the upload service.
    pub upload_tokens: TokenVerifier,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        engine: Arc<Engine>,
        config: &ServerConfig,
        upload_tokens: TokenVerifier,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            engine,
            auth: Arc::new(TokenAuthenticator::new(config.auth.tokens.clone())),
            signal_secret: Arc::from(config.signal_secret.as_str()),
            upload_tokens,
            max_body_bytes: config.max_payload_bytes,
            metrics,
        }
    }
}
