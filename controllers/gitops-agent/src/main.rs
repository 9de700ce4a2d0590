//! GitOps Agent Controller
//!
//! Reconciles `Agent` managed resources (`gitops.harness.crossplane.io`)
//! against the Harness GitOps API: missing agents are created, existing ones
//! have their health mirrored into status.
//!
//! Configuration is read from the environment, see [`config`].

mod backoff;
mod config;
mod connector;
mod controller;
mod error;
mod external;
mod managed;
mod metrics;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting GitOps Agent Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Harness URL: {}", config.harness.base_url);
    info!("  Poll interval: {}s", config.poll_interval.as_secs());
    info!("  Max concurrent reconciles: {}", config.max_concurrent_reconciles);
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
