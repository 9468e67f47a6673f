//! # Harbor Provider
//!
//! A Kubernetes controller that reconciles Harbor registry objects (robot
//! accounts, users, projects, scanner registrations) from declarative
//! records, Crossplane style.
//!
//! ## Overview
//!
//! 1. **Watches records** of every registered kind across all namespaces
//! 2. **Resolves credentials** from the referenced `ProviderConfig`
//! 3. **Observes Harbor** and creates, updates or deletes the external object
//! 4. **Publishes connection details** to the record's connection secret
//!
//! Configuration comes from the environment (see `config::ControllerConfig`);
//! command-line flags take precedence.

use anyhow::{Context, Result};
use clap::Parser;
use harbor_provider::config::{parse_interval, ControllerConfig};
use harbor_provider::controller::connector::rest_client_factory;
use harbor_provider::controller::setup::{registry, Stores};
use harbor_provider::observability;
use harbor_provider::runtime::{Driver, DriverSettings};
use harbor_provider::server::{start_server, ServerState};
use kube::Client;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Harbor provider controller
#[derive(Parser, Debug)]
#[command(name = "harbor-provider", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Requeue interval for converged records (e.g. "30s", "10m", "1h")
    #[arg(long, value_parser = parse_duration_flag)]
    poll: Option<Duration>,

    /// Interval between full relists of every kind (e.g. "1h")
    #[arg(long, value_parser = parse_duration_flag)]
    sync: Option<Duration>,

    /// Global maximum of attempt starts per second (0 disables the limit)
    #[arg(long)]
    max_reconcile_rate: Option<u32>,

    /// Maximum concurrent reconciliations
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Port of the metrics and probe server
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn parse_duration_flag(value: &str) -> Result<Duration, String> {
    parse_interval(value).map_err(|e| e.to_string())
}

impl Cli {
    fn apply(&self, mut config: ControllerConfig) -> ControllerConfig {
        if self.debug {
            config.log_level = "DEBUG".to_string();
        }
        if let Some(poll) = self.poll {
            config.poll_interval_secs = poll.as_secs();
        }
        if let Some(sync) = self.sync {
            config.sync_interval_secs = sync.as_secs();
        }
        if let Some(rate) = self.max_reconcile_rate {
            config.max_reconcile_rate = rate;
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent_reconciliations = max;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    let cli = Cli::parse();
    let config = cli.apply(ControllerConfig::from_env().with_debug_from_env());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("harbor_provider={}", config.log_level.to_lowercase()).into()
            }),
        )
        .init();

    info!("Starting Harbor provider");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Configuration: poll={:?}, sync={:?}, max_concurrent={}, max_reconcile_rate={}/s",
        config.poll_interval(),
        config.sync_interval(),
        config.max_concurrent_reconciliations,
        config.max_reconcile_rate
    );

    observability::register_metrics().context("Failed to register metrics")?;

    let ready = Arc::new(AtomicBool::new(false));
    let server_state = Arc::new(ServerState {
        is_ready: Arc::clone(&ready),
    });
    let server_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let stores = Stores::kube(&client);
    let factory = rest_client_factory(config.http_timeout());
    let registry = registry(&stores, &config, &factory);
    info!("Registered {} kinds", registry.len());

    let driver =
        Driver::new(registry, DriverSettings::from_config(&config)).with_readiness(ready);
    let shutdown = driver.shutdown_token();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, draining in-flight reconciliations..."),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });

    driver.run().await;

    info!("Controller stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::parse_from([
            "harbor-provider",
            "--debug",
            "--poll",
            "30s",
            "--sync",
            "1h",
            "--max-concurrent",
            "3",
        ]);
        let config = cli.apply(ControllerConfig::default());
        assert_eq!(config.log_level, "DEBUG");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.sync_interval_secs, 3600);
        assert_eq!(config.max_concurrent_reconciliations, 3);
        assert_eq!(config.max_reconcile_rate, 10);
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        assert!(Cli::try_parse_from(["harbor-provider", "--poll", "soon"]).is_err());
    }
}
