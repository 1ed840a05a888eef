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

//! Configuration for the engine.
//!
//! Use [`EngineConfig::builder()`] to create a configuration:
//!
//! ```rust,ignore
//! let config = EngineConfig::builder()
//!     .worker_concurrency(8)
//!     .max_attempts(3)
//!     .execution_timeout(Duration::from_secs(120))
//!     .build();
//! ```
//!
//! Or use the default configuration with `EngineConfig::default()`.

use std::time::Duration;

use crate::error::EngineError;
use crate::executor::RetryPolicy;

/// Settings for the background sweep that repairs stuck requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerConfig {
    /// Whether the engine runs the sweep at all
    pub enabled: bool,
    /// How often the sweep runs
    pub sweep_interval: Duration,
    /// A `Queued` request untouched for this long gets its signal re-sent
    pub queued_stale_after: Duration,
    /// An `Executing` request untouched for this long is presumed abandoned
    pub executing_stale_after: Duration,
    /// Maximum rows handled per status per sweep
    pub batch_size: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval: Duration::from_secs(60),
            queued_stale_after: Duration::from_secs(600),
            executing_stale_after: Duration::from_secs(900),
            batch_size: 100,
        }
    }
}

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EngineConfig {
    worker_concurrency: usize,
    max_attempts: i32,
    execution_timeout: Duration,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
    max_payload_bytes: usize,
    shutdown_grace: Duration,
    reconciler: ReconcilerConfig,
}

impl EngineConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Number of concurrent workers.
    pub fn worker_concurrency(&self) -> usize {
        self.worker_concurrency
    }

    /// Maximum backend attempts per request, counting the first.
    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    /// Upper bound on a single backend call.
    pub fn execution_timeout(&self) -> Duration {
        self.execution_timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// How long an idle worker waits before re-checking the queue.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Largest accepted request payload.
    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// How long shutdown waits for in-flight executions.
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    pub fn reconciler(&self) -> &ReconcilerConfig {
        &self.reconciler
    }

    /// Checks settings that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.worker_concurrency == 0 {
            return Err(EngineError::Validation(
                "worker_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_attempts < 1 {
            return Err(EngineError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.execution_timeout.is_zero() {
            return Err(EngineError::Validation(
                "execution_timeout must be non-zero".to_string(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(EngineError::Validation(
                "max_payload_bytes must be non-zero".to_string(),
            ));
        }
        // An execution must be allowed to finish before it can be reclaimed.
        if self.reconciler.enabled && self.reconciler.executing_stale_after <= self.execution_timeout
        {
            return Err(EngineError::Validation(format!(
                "reconciler executing_stale_after ({:?}) must exceed execution_timeout ({:?})",
                self.reconciler.executing_stale_after, self.execution_timeout
            )));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig {
                worker_concurrency: 4,
                max_attempts: 5,
                execution_timeout: Duration::from_secs(60),
                retry_policy: RetryPolicy::default(),
                poll_interval: Duration::from_millis(500),
                max_payload_bytes: 1024 * 1024,
                shutdown_grace: Duration::from_secs(30),
                reconciler: ReconcilerConfig::default(),
            },
        }
    }
}

impl EngineConfigBuilder {
    pub fn worker_concurrency(mut self, value: usize) -> Self {
        self.config.worker_concurrency = value;
        self
    }

    pub fn max_attempts(mut self, value: i32) -> Self {
        self.config.max_attempts = value;
        self
    }

    pub fn execution_timeout(mut self, value: Duration) -> Self {
        self.config.execution_timeout = value;
        self
    }

    pub fn retry_policy(mut self, value: RetryPolicy) -> Self {
        self.config.retry_policy = value;
        self
    }

    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    pub fn max_payload_bytes(mut self, value: usize) -> Self {
        self.config.max_payload_bytes = value;
        self
    }

    pub fn shutdown_grace(mut self, value: Duration) -> Self {
        self.config.shutdown_grace = value;
        self
    }

    pub fn reconciler(mut self, value: ReconcilerConfig) -> Self {
        self.config.reconciler = value;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfigBuilder::default().build()
    }
}
