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

//! Caller authentication.
//!
//! Clients present a bearer token that maps to an owner id. The upload
//! service presents a shared secret in the `x-holdfast-signal-secret` header.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::state::AppState;

pub const SIGNAL_SECRET_HEADER: &str = "x-holdfast-signal-secret";

/// Maps static bearer tokens to owner ids.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, String>,
}

impl TokenAuthenticator {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Owner id for the bearer token in `headers`, if it is known.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<&str> {
        let token = headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .trim();
        self.tokens
            .iter()
            .find(|(known, _)| constant_time_eq(known.as_bytes(), token.as_bytes()))
            .map(|(_, owner)| owner.as_str())
    }
}

/// The authenticated owner of a client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        state
            .auth
            .authenticate(&parts.headers)
            .map(|owner| Principal(owner.to_string()))
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Proof that a call came from the upload service.
#[derive(Debug, Clone, Copy)]
pub struct SignalCaller;

impl FromRequestParts<AppState> for SignalCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let presented = parts
            .headers
            .get(SIGNAL_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !state.signal_secret.is_empty()
            && constant_time_eq(presented.as_bytes(), state.signal_secret.as_bytes())
        {
            Ok(SignalCaller)
        } else {
            Err(ApiError::unauthorized())
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
