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

pub mod cleanup_events;
pub mod generate_signing_key;
pub mod migrate;
pub mod serve;

use anyhow::{Context, Result};
use holdfast::Database;
use holdfast_server::{ConfigOverrides, ServerConfig};
use std::path::Path;

/// Database URL from the config file and overrides, without requiring the
/// settings only `serve` needs.
fn database_url(config: Option<&Path>, overrides: &ConfigOverrides) -> Result<String> {
    let mut settings = match config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    settings.apply(overrides);
    Ok(settings.database_url)
}

fn connect(database_url: &str) -> Result<Database> {
    Database::new(database_url, 1)
        .with_context(|| format!("Failed to connect to database '{}'", database_url))
}
