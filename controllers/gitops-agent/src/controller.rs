//! Main controller implementation.
//!
//! Wires the Kubernetes client, connector, reconciler, watcher and metrics
//! server together and runs them until one of them stops.

use crate::config::ControllerConfig;
use crate::connector::{Connector, HarnessClientFactory, KubeProviderConfigResolver};
use crate::error::ControllerError;
use crate::metrics::{self, Metrics, ServerState};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::Agent;
use kube::api::ListParams;
use kube::{Api, Client};
use prometheus::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for Agent resources.
pub struct Controller {
    agent_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing GitOps Agent Controller");

        let kube_client = Client::try_default().await?;

        // Fail early when the CRD is not installed
        let agent_api: Api<Agent> = Api::all(kube_client.clone());
        agent_api.list(&ListParams::default().limit(1)).await.map_err(|e| {
            error!("Cannot list Agent resources, is the CRD installed? {}", e);
            ControllerError::Kube(e)
        })?;

        let registry = Registry::new();
        let metrics = Metrics::new(&registry)?;

        let connector = Connector::new(
            Arc::new(KubeProviderConfigResolver::new(kube_client.clone())),
            Arc::new(HarnessClientFactory::new(config.harness.clone())),
        );
        let reconciler = Arc::new(Reconciler::new(
            kube_client,
            Arc::new(connector),
            metrics,
            config.poll_interval,
        ));

        let server_state = ServerState::new(registry);
        let listener = TcpListener::bind(config.metrics_addr).await?;
        let metrics_server = tokio::spawn(metrics::serve(listener, server_state.clone()));

        let watcher = Watcher::new(reconciler, agent_api, config.max_concurrent_reconciles, server_state);
        let agent_watcher = tokio::spawn(async move { watcher.watch_agents().await });

        Ok(Self {
            agent_watcher,
            metrics_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("GitOps Agent Controller running");

        tokio::select! {
            result = &mut self.agent_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Agent watcher panicked: {}", e)))??;
                info!("Agent watcher finished, shutting down");
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))??;
                return Err(ControllerError::Watch("Metrics server exited".to_string()));
            }
        }

        self.metrics_server.abort();
        Ok(())
    }
}
