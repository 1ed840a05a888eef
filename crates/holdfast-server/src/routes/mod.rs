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

//! HTTP routes.
//!
//! | Method | Path                                         | Caller         |
//! |--------|----------------------------------------------|----------------|
//! | POST   | `/api/v1/requests`                           | client         |
//! | GET    | `/api/v1/requests/{id}`                      | client         |
//! | GET    | `/api/v1/auth/pubkey`                        | upload service |
//! | POST   | `/api/v1/uploads/{correlation_id}/complete`  | upload service |
//! | POST   | `/api/v1/uploads/{correlation_id}/progress`  | upload service |
//! | GET    | `/health`                                    | anyone         |
//! | GET    | `/metrics`                                   | anyone         |

mod health;
mod keys;
mod requests;
mod signals;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/requests", post(requests::create_request))
        .route("/requests/{id}", get(requests::get_request))
        .route("/auth/pubkey", get(keys::upload_public_key))
        .route(
            "/uploads/{correlation_id}/complete",
            post(signals::upload_complete),
        )
        .route(
            "/uploads/{correlation_id}/progress",
            post(signals::upload_progress),
        );

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
