//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use harness_client::{DEFAULT_BASE_URL, HarnessClientConfig};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 3;
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Runtime configuration of the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Settings for every Harness client built by the connector
    pub harness: HarnessClientConfig,
    /// Requeue interval after a successful pass
    pub poll_interval: Duration,
    /// Upper bound on concurrent reconciles
    pub max_concurrent_reconciles: u16,
    /// Listener for `/metrics`, `/healthz` and `/readyz`
    pub metrics_addr: SocketAddr,
}

impl ControllerConfig {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, treating empty values as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get("HARNESS_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let poll_secs: u64 = parse_or(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let max_concurrent_reconciles = parse_or(
            get("MAX_CONCURRENT_RECONCILES"),
            "MAX_CONCURRENT_RECONCILES",
            DEFAULT_MAX_CONCURRENT_RECONCILES,
        )?;

        let metrics_addr = match get("METRICS_ADDR") {
            Some(raw) => parse_value(&raw, "METRICS_ADDR")?,
            None => parse_value(DEFAULT_METRICS_ADDR, "METRICS_ADDR")?,
        };

        Ok(Self {
            harness: HarnessClientConfig {
                base_url,
                ..HarnessClientConfig::default()
            },
            poll_interval: Duration::from_secs(poll_secs),
            max_concurrent_reconciles,
            metrics_addr,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ControllerError> {
    match raw {
        Some(raw) => parse_value(&raw, key),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(raw: &str, key: &str) -> Result<T, ControllerError> {
    raw.trim()
        .parse()
        .map_err(|_| ControllerError::InvalidConfig(format!("{} has invalid value {:?}", key, raw)))
}
