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

//! Implementation of the `serve` command.

use anyhow::{Context, Result};
use holdfast::{Database, Engine, JsonRpcBackend, UrlUploadService};
use holdfast_server::{AppState, ConfigOverrides, ServerConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use url::Url;

pub async fn run(config: Option<&Path>, overrides: &ConfigOverrides) -> Result<()> {
    let config = ServerConfig::load(config, overrides).context("Invalid configuration")?;

    let metrics = if config.metrics_enabled {
        Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("Failed to install metrics recorder")?,
        )
    } else {
        None
    };

    let database = Database::new(&config.database_url, config.db_pool_size)
        .context("Failed to connect to database")?;
    let uploads = UrlUploadService::new(&config.upload_service_url, config.token_signer()?)
        .context("Invalid upload_service_url")?;
    let upload_tokens = uploads.verifier();
    let backend_url = Url::parse(&config.backend_url)
        .with_context(|| format!("Invalid backend_url '{}'", config.backend_url))?;
    let backend = JsonRpcBackend::new(backend_url, config.backend_timeout())
        .context("Failed to build backend client")?;

    let engine = Engine::builder(database)
        .upload_service(Arc::new(uploads))
        .backend(Arc::new(backend))
        .config(config.engine_config())
        .start()
        .await
        .context("Failed to start engine")?;
    let engine = Arc::new(engine);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %listener.local_addr()?, "Holdfast server listening");

    let state = AppState::new(engine.clone(), &config, upload_tokens, metrics);
    let served = holdfast_server::serve(listener, state, shutdown_signal()).await;

    engine.shutdown().await;
    served.context("HTTP server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received, draining");
}
