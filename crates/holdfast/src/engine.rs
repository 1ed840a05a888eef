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

//! The assembled engine.
//!
//! ```rust,ignore
//! let signer = TokenSigner::from_seed_base64(&seed, Duration::from_secs(3600))?;
//! let engine = Engine::builder(database)
//!     .upload_service(Arc::new(UrlUploadService::new("https://uploads.example.com/v1/", signer)?))
//!     .backend(Arc::new(JsonRpcBackend::new(wallet_url, Duration::from_secs(30))?))
//!     .config(EngineConfig::default())
//!     .start()
//!     .await?;
//!
//! let created = engine.issuer().create("user-1", payload).await?;
//! // ... the upload service later calls:
//! engine.dispatcher().on_upload_complete(&correlation_id).await?;
//!
//! engine.shutdown().await;
//! ```

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::backend::ExecutionBackend;
use crate::config::EngineConfig;
use crate::dal::DAL;
use crate::database::Database;
use crate::dispatcher::{Dispatcher, PollingDistributor, WorkDistributor};
use crate::error::EngineError;
use crate::executor::{RequestProcessor, WorkerPool};
use crate::issuer::UploadHandleIssuer;
use crate::queue::{OutboxQueue, WorkQueue};
use crate::reconciler::Reconciler;
use crate::status::StatusService;
use crate::upload::UploadService;

/// Builder for [`Engine`].
pub struct EngineBuilder {
    database: Database,
    uploads: Option<Arc<dyn UploadService>>,
    backend: Option<Arc<dyn ExecutionBackend>>,
    queue: Option<Arc<dyn WorkQueue>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn upload_service(mut self, uploads: Arc<dyn UploadService>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replaces the default outbox-backed queue.
    pub fn queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies migrations, then starts the worker pool and reconciler.
    pub async fn start(self) -> Result<Engine, EngineError> {
        self.config.validate()?;
        let uploads = self
            .uploads
            .ok_or_else(|| EngineError::Validation("an upload service is required".to_string()))?;
        let backend = self
            .backend
            .ok_or_else(|| EngineError::Validation("an execution backend is required".to_string()))?;

        self.database.run_migrations().await?;

        let dal = DAL::new(self.database);
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(OutboxQueue::new(dal.clone())));
        let distributor: Arc<dyn WorkDistributor> = Arc::new(
            PollingDistributor::with_poll_interval(self.config.poll_interval()),
        );

        let processor = RequestProcessor::new(
            dal.clone(),
            backend,
            queue.clone(),
            distributor.clone(),
            self.config.max_attempts(),
            self.config.execution_timeout(),
            self.config.retry_policy().clone(),
        );
        let workers = WorkerPool::start(
            processor,
            queue.clone(),
            distributor.clone(),
            self.config.worker_concurrency(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconciler = Reconciler::new(
            dal.clone(),
            queue.clone(),
            distributor.clone(),
            self.config.reconciler().clone(),
        );
        let reconciler_handle = self
            .config
            .reconciler()
            .enabled
            .then(|| reconciler.spawn(shutdown_rx));

        info!(
            backend = dal.database().backend().as_str(),
            workers = self.config.worker_concurrency(),
            max_attempts = self.config.max_attempts(),
            "Engine started"
        );

        Ok(Engine {
            issuer: UploadHandleIssuer::new(dal.clone(), uploads, self.config.max_payload_bytes()),
            dispatcher: Dispatcher::new(dal.clone(), queue.clone(), distributor),
            status: StatusService::new(dal.clone()),
            dal,
            queue,
            config: self.config,
            runtime: Mutex::new(Some(Runtime {
                workers,
                reconciler: reconciler_handle,
                shutdown_tx,
            })),
        })
    }
}

struct Runtime {
    workers: WorkerPool,
    reconciler: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

/// A running engine. Share it behind an `Arc`.
pub struct Engine {
    issuer: UploadHandleIssuer,
    dispatcher: Dispatcher,
    status: StatusService,
    dal: DAL,
    queue: Arc<dyn WorkQueue>,
    config: EngineConfig,
    runtime: Mutex<Option<Runtime>>,
}

impl Engine {
    pub fn builder(database: Database) -> EngineBuilder {
        EngineBuilder {
            database,
            uploads: None,
            backend: None,
            queue: None,
            config: EngineConfig::default(),
        }
    }

    pub fn issuer(&self) -> &UploadHandleIssuer {
        &self.issuer
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn status(&self) -> &StatusService {
        &self.status
    }

    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of processing signals waiting in the queue.
    pub async fn queue_depth(&self) -> Result<i64, EngineError> {
        Ok(self.queue.pending().await?)
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }

    /// Stops the reconciler and drains the worker pool within the configured
    /// grace period. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return;
        };

        let _ = runtime.shutdown_tx.send(true);
        if let Some(handle) = runtime.reconciler {
            let _ = handle.await;
        }
        runtime.workers.shutdown(self.config.shutdown_grace()).await;
        info!("Engine stopped");
    }
}
