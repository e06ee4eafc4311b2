// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Taskmesh Global Component Manager
//!
//! Hosts the global registry of a deployment:
//! - Registers the processes, components and connections of a deployment file
//! - Logs every registry change
//! - Dumps the registry periodically and on shutdown
//!
//! # Usage
//!
//! ```bash
//! # Empty registry with default settings
//! taskmesh-gcm
//!
//! # Manager settings and a deployment to register
//! taskmesh-gcm --config manager.toml --deployment deployment.toml
//!
//! # JSON dump every 5 seconds
//! taskmesh-gcm --deployment deployment.toml --dump-interval 5 --json
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use taskmesh::{ManagerConfig, Registry};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod deployment;

pub use deployment::{Deployment, DeploymentError};

/// Taskmesh Global Component Manager - registry of processes, components and connections
#[derive(Parser, Debug)]
#[command(name = "taskmesh-gcm")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Manager configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Deployment to register at startup (TOML format)
    #[arg(short, long)]
    deployment: Option<PathBuf>,

    /// Seconds between registry dumps (0 = only on shutdown)
    #[arg(long, default_value = "10")]
    dump_interval: u64,

    /// Dump the registry as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// Disconnect connections left unconfirmed for this many seconds
    #[arg(long)]
    connect_confirm_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn dump(registry: &Registry, json: bool) {
    if json {
        match serde_json::to_string_pretty(&registry.snapshot()) {
            Ok(text) => info!("Registry snapshot:\n{}", text),
            Err(e) => warn!("Registry snapshot serialization failed: {}", e),
        }
    } else {
        info!("Registry:\n{}", registry.dump());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading config from {:?}", config_path);
        ManagerConfig::from_file(config_path)?
    } else {
        ManagerConfig::default()
    };
    if let Some(timeout) = args.connect_confirm_timeout {
        config.connect_confirm_timeout_secs = timeout;
    }
    config.validate()?;

    info!("+----------------------------------------------------+");
    info!(
        "|     Taskmesh Global Component Manager v{:<11} |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Mailbox:  {:38} |", config.mailbox_size);
    info!(
        "|  Confirm:  {:38} |",
        match config.connect_confirm_timeout() {
            Some(timeout) => format!("{}s", timeout.as_secs()),
            None => "no timeout".to_string(),
        }
    );
    info!(
        "|  Dump:     {:38} |",
        if args.dump_interval == 0 {
            "on shutdown".to_string()
        } else {
            format!("every {}s", args.dump_interval)
        }
    );
    info!("+----------------------------------------------------+");

    let registry = Registry::new(config)?;

    // Log registry changes
    let events = registry.subscribe();
    let event_log = tokio::task::spawn_blocking(move || {
        for event in events.iter() {
            info!("Registry event: {:?}", event);
        }
    });

    if let Some(path) = &args.deployment {
        info!("Loading deployment from {:?}", path);
        Deployment::from_file(path)?.apply(&registry)?;
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(Duration::from_secs(args.dump_interval.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick(), if args.dump_interval > 0 => dump(&registry, args.json),
        }
    }

    info!("Shutdown signal received, disconnecting...");
    for connection in registry.list_connections() {
        if let Err(e) = registry.disconnect(connection.id) {
            warn!("Disconnect {} failed: {}", connection, e);
        }
    }
    let flushing = registry.clone();
    tokio::task::spawn_blocking(move || flushing.flush_disconnects()).await?;
    dump(&registry, args.json);

    // Dropping the last handle closes the event stream.
    drop(registry);
    event_log.await?;

    info!("Global component manager stopped");
    Ok(())
}
