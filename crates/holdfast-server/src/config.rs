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

//! Server configuration.
//!
//! Settings come from an optional TOML file, then from command-line flags
//! and environment variables, which take precedence:
//!
//! ```toml
//! database_url = "sqlite:///var/lib/holdfast/holdfast.db"
//! bind_address = "0.0.0.0:8080"
//! upload_service_url = "https://uploads.example.com/v1/"
//! upload_signing_key = "<output of `holdfast-server admin generate-signing-key`>"
//! backend_url = "http://wallet:5279/"
//! signal_secret = "change-me"
//!
//! [engine]
//! worker_concurrency = 8
//! max_attempts = 5
//!
//! [auth.tokens]
//! "token-abc" = "user-1"
//! ```

use clap::Args;
use holdfast::{EngineConfig, ReconcilerConfig, RetryPolicy, TokenSigner};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub database_url: String,
    pub db_pool_size: u32,
    pub bind_address: String,
    /// Base URL under which upload locations are minted.
    pub upload_service_url: String,
    /// Base64 Ed25519 private key seed used to sign upload tokens.
    pub upload_signing_key: String,
    pub upload_token_ttl_secs: u64,
    /// JSON-RPC endpoint that executes requests.
    pub backend_url: String,
    pub backend_timeout_secs: u64,
    /// Shared secret the upload service presents on completion signals.
    pub signal_secret: String,
    pub max_payload_bytes: usize,
    pub metrics_enabled: bool,
    pub engine: EngineSection,
    pub reconciler: ReconcilerSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub worker_concurrency: usize,
    pub max_attempts: i32,
    pub execution_timeout_secs: u64,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_secs: u64,
    pub poll_interval_ms: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcilerSection {
    pub enabled: bool,
    pub sweep_interval_secs: u64,
    pub queued_stale_after_secs: u64,
    pub executing_stale_after_secs: u64,
    pub batch_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    /// Bearer token to owner id.
    pub tokens: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://holdfast.db".to_string(),
            db_pool_size: 10,
            bind_address: "127.0.0.1:8080".to_string(),
            upload_service_url: String::new(),
            upload_signing_key: String::new(),
            upload_token_ttl_secs: 3600,
            backend_url: String::new(),
            backend_timeout_secs: 30,
            signal_secret: String::new(),
            max_payload_bytes: 1024 * 1024,
            metrics_enabled: true,
            engine: EngineSection::default(),
            reconciler: ReconcilerSection::default(),
            auth: AuthSection::default(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        let retry = RetryPolicy::default();
        Self {
            worker_concurrency: defaults.worker_concurrency(),
            max_attempts: defaults.max_attempts(),
            execution_timeout_secs: defaults.execution_timeout().as_secs(),
            retry_base_delay_ms: retry.base_delay.as_millis() as u64,
            retry_max_delay_secs: retry.max_delay.as_secs(),
            poll_interval_ms: defaults.poll_interval().as_millis() as u64,
            shutdown_grace_secs: defaults.shutdown_grace().as_secs(),
        }
    }
}

impl Default for ReconcilerSection {
    fn default() -> Self {
        let defaults = ReconcilerConfig::default();
        Self {
            enabled: defaults.enabled,
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
            queued_stale_after_secs: defaults.queued_stale_after.as_secs(),
            executing_stale_after_secs: defaults.executing_stale_after.as_secs(),
            batch_size: defaults.batch_size,
        }
    }
}

/// Command-line and environment overrides for [`ServerConfig`].
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(long, env = "HOLDFAST_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Base URL for upload locations
    #[arg(long, env = "HOLDFAST_UPLOAD_SERVICE_URL")]
    pub upload_service_url: Option<String>,

    /// Base64 Ed25519 key seed for signing upload tokens
    #[arg(long, env = "HOLDFAST_UPLOAD_SIGNING_KEY", hide_env_values = true)]
    pub upload_signing_key: Option<String>,

    /// JSON-RPC backend URL
    #[arg(long, env = "HOLDFAST_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Shared secret for upload completion signals
    #[arg(long, env = "HOLDFAST_SIGNAL_SECRET", hide_env_values = true)]
    pub signal_secret: Option<String>,

    /// Number of workers executing requests
    #[arg(long, env = "HOLDFAST_WORKERS")]
    pub workers: Option<usize>,

    /// Attempts per request before it is marked failed
    #[arg(long, env = "HOLDFAST_MAX_ATTEMPTS")]
    pub max_attempts: Option<i32>,
}

impl ServerConfig {
    /// Loads `path` if given, otherwise starts from defaults, then applies
    /// `overrides` and validates the result.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        let ConfigOverrides {
            database_url,
            bind_address,
            upload_service_url,
            upload_signing_key,
            backend_url,
            signal_secret,
            workers,
            max_attempts,
        } = overrides.clone();

        if let Some(v) = database_url {
            self.database_url = v;
        }
        if let Some(v) = bind_address {
            self.bind_address = v;
        }
        if let Some(v) = upload_service_url {
            self.upload_service_url = v;
        }
        if let Some(v) = upload_signing_key {
            self.upload_signing_key = v;
        }
        if let Some(v) = backend_url {
            self.backend_url = v;
        }
        if let Some(v) = signal_secret {
            self.signal_secret = v;
        }
        if let Some(v) = workers {
            self.engine.worker_concurrency = v;
        }
        if let Some(v) = max_attempts {
            self.engine.max_attempts = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("database_url", &self.database_url),
            ("bind_address", &self.bind_address),
            ("upload_service_url", &self.upload_service_url),
            ("upload_signing_key", &self.upload_signing_key),
            ("backend_url", &self.backend_url),
            ("signal_secret", &self.signal_secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must be set", name)));
            }
        }
        if self.db_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "db_pool_size must be at least 1".to_string(),
            ));
        }
        if self.auth.tokens.values().any(|owner| owner.is_empty()) {
            return Err(ConfigError::Invalid(
                "auth tokens must map to a non-empty owner id".to_string(),
            ));
        }
        self.token_signer()?;

        self.engine_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Signer for upload tokens, from `upload_signing_key`.
    pub fn token_signer(&self) -> Result<TokenSigner, ConfigError> {
        TokenSigner::from_seed_base64(
            &self.upload_signing_key,
            Duration::from_secs(self.upload_token_ttl_secs),
        )
        .map_err(|e| ConfigError::Invalid(format!("upload signing key: {}", e)))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let engine = &self.engine;
        let reconciler = &self.reconciler;
        EngineConfig::builder()
            .worker_concurrency(engine.worker_concurrency)
            .max_attempts(engine.max_attempts)
            .execution_timeout(Duration::from_secs(engine.execution_timeout_secs))
            .retry_policy(RetryPolicy {
                base_delay: Duration::from_millis(engine.retry_base_delay_ms),
                max_delay: Duration::from_secs(engine.retry_max_delay_secs),
                ..RetryPolicy::default()
            })
            .poll_interval(Duration::from_millis(engine.poll_interval_ms))
            .max_payload_bytes(self.max_payload_bytes)
            .shutdown_grace(Duration::from_secs(engine.shutdown_grace_secs))
            .reconciler(ReconcilerConfig {
                enabled: reconciler.enabled,
                sweep_interval: Duration::from_secs(reconciler.sweep_interval_secs),
                queued_stale_after: Duration::from_secs(reconciler.queued_stale_after_secs),
                executing_stale_after: Duration::from_secs(reconciler.executing_stale_after_secs),
                batch_size: reconciler.batch_size,
            })
            .build()
    }
}
