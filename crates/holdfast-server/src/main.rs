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

//! Holdfast server binary.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use holdfast_server::ConfigOverrides;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Holdfast - deferred execution of upload-gated requests
#[derive(Parser)]
#[command(name = "holdfast-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "HOLDFAST_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server, worker pool and reconciler
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Delete request events older than a retention period
    CleanupEvents {
        /// Delete events older than this duration (e.g., "90d", "7d12h", "24h")
        #[arg(long, default_value = "90d")]
        older_than: String,

        /// Only report how many events would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate an Ed25519 key for signing upload tokens
    GenerateSigningKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let (text, json) = match cli.log_format {
        LogFormat::Text => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();

    match cli.command {
        Commands::Serve => commands::serve::run(cli.config.as_deref(), &cli.overrides).await,
        Commands::Migrate => {
            commands::migrate::run(cli.config.as_deref(), &cli.overrides).await
        }
        Commands::Admin { command } => match command {
            AdminCommands::CleanupEvents {
                older_than,
                dry_run,
            } => {
                commands::cleanup_events::run(
                    cli.config.as_deref(),
                    &cli.overrides,
                    &older_than,
                    dry_run,
                )
                .await
            }
            AdminCommands::GenerateSigningKey => commands::generate_signing_key::run(),
        },
    }
}
