//! Controller-specific error types.
//!
//! This module defines error types specific to the GitOps Agent controller
//! that are not covered by upstream library errors.

use harness_client::HarnessError;
use kube::Error as KubeError;
use kube_runtime::finalizer;
use thiserror::Error;

/// Errors that can occur in the GitOps Agent controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// ProviderConfig could not be fetched
    #[error("cannot get ProviderConfig: {0}")]
    ConfigurationLookup(String),

    /// Credentials could not be read from their source
    #[error("cannot get credentials: {0}")]
    CredentialExtraction(String),

    /// Harness client could not be built from the credentials
    #[error("cannot create new Service: {0}")]
    ClientConstruction(String),

    /// ProviderConfigUsage could not be recorded
    #[error("cannot track ProviderConfig usage: {0}")]
    UsageTracking(String),

    /// Harness API call failed
    #[error("Harness {operation} failed: {source}")]
    RemoteCall {
        /// Operation that failed, e.g. `get agent`
        operation: &'static str,
        /// Underlying client error
        #[source]
        source: HarnessError,
    },

    /// Invalid configuration or resource spec
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Adding or removing the finalizer failed, or the wrapped pass failed
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<finalizer::Error<ControllerError>>),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics/probe server failed
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Wraps a Harness error with the operation it came from
    pub fn remote(operation: &'static str, source: HarnessError) -> Self {
        Self::RemoteCall { operation, source }
    }

    /// Short label used for the error metric
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Kube(_) => "kube",
            Self::ConfigurationLookup(_) => "configuration_lookup",
            Self::CredentialExtraction(_) => "credential_extraction",
            Self::ClientConstruction(_) => "client_construction",
            Self::UsageTracking(_) => "usage_tracking",
            Self::RemoteCall { .. } => "remote_call",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Finalizer(inner) => match inner.as_ref() {
                finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => e.metric_label(),
                _ => "finalizer",
            },
            Self::Metrics(_) => "metrics",
            Self::Server(_) => "server",
            Self::Watch(_) => "watch",
        }
    }

    /// Reason of the Warning event recorded on the failing resource
    pub fn event_reason(&self) -> &'static str {
        match self {
            Self::ConfigurationLookup(_)
            | Self::CredentialExtraction(_)
            | Self::ClientConstruction(_)
            | Self::UsageTracking(_) => "CannotConnectToProvider",
            Self::RemoteCall { operation: "create agent", .. } => "CannotCreateExternalResource",
            Self::RemoteCall { .. } | Self::InvalidConfig(_) => "CannotObserveExternalResource",
            Self::Finalizer(inner) => match inner.as_ref() {
                finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => e.event_reason(),
                _ => "ReconcileError",
            },
            _ => "ReconcileError",
        }
    }
}
