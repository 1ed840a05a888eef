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

//! # Holdfast server
//!
//! HTTP front end for the [`holdfast`] engine: clients submit deferred
//! requests and poll their status, the upload service reports upload
//! progress and completion.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ConfigOverrides, ServerConfig};
pub use error::{ApiError, Envelope, ResponseKind};
pub use routes::{router, serve};
pub use state::AppState;
