//! External client for Agent resources.
//!
//! Maps the managed lifecycle onto the Harness GitOps agent API. Agents are
//! looked up by `identifier` within `accountIdentifier`; their health is
//! mirrored into `status.atProvider.state` and the `Ready` condition.
//! Harness offers no drift signal the controller acts on, so existing agents
//! are always reported up to date, and neither update nor delete touches the
//! remote side.

use crate::error::ControllerError;
use crate::managed::{ConnectionDetails, ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};
use async_trait::async_trait;
use crds::{Agent, AgentParameters, Condition};
use harness_client::{AgentMetadata, AppProjectMapping, HarnessClientTrait, HealthStatus};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Namespace the agent is installed into on the target cluster
const AGENT_NAMESPACE: &str = "harness";

/// Connection detail key carrying the agent's private key
pub const PRIVATE_KEY_DETAIL: &str = "privateKey";

/// Agent operations backed by a Harness client
pub struct AgentExternal {
    client: Arc<dyn HarnessClientTrait>,
}

impl AgentExternal {
    pub fn new(client: Arc<dyn HarnessClientTrait>) -> Self {
        Self { client }
    }
}

fn required_account(params: &AgentParameters) -> Result<&str, ControllerError> {
    params
        .account_identifier
        .as_deref()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            ControllerError::InvalidConfig("spec.forProvider.accountIdentifier is required".to_string())
        })
}

/// Payload for `create_agent`; unset optional fields are sent as `""`
fn creation_payload(agent: &Agent) -> harness_client::Agent {
    let params = &agent.spec.for_provider;
    harness_client::Agent {
        account_identifier: params.account_identifier.clone().unwrap_or_default(),
        project_identifier: params.project_identifier.clone().unwrap_or_default(),
        org_identifier: params.org_identifier.clone().unwrap_or_default(),
        identifier: params.identifier.clone(),
        name: agent.name_any(),
        description: params.description.clone().unwrap_or_default(),
        metadata: Some(AgentMetadata {
            namespace: AGENT_NAMESPACE.to_string(),
            high_availability: true,
            mapped_projects: Some(AppProjectMapping::default()),
            existing_installation: None,
        }),
        tags: params.tags.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn health_state(remote: &harness_client::Agent) -> String {
    remote
        .health_status()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl ExternalClient<Agent> for AgentExternal {
    async fn observe(&self, agent: &mut Agent) -> Result<ExternalObservation, ControllerError> {
        let params = &agent.spec.for_provider;
        let account = required_account(params)?;

        let remote = match self.client.get_agent(&params.identifier, account).await {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                debug!("Agent {} not found in account {}", params.identifier, account);
                return Ok(ExternalObservation::default());
            }
            Err(e) => return Err(ControllerError::remote("get agent", e)),
        };

        let status = agent.status_mut();
        status.at_provider.state = health_state(&remote);
        match remote.health_status() {
            Some(HealthStatus::Healthy) => status.set_condition(Condition::available()),
            Some(_) => status.set_condition(Condition::unavailable()),
            None => {}
        }

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn create(&self, agent: &mut Agent) -> Result<ExternalCreation, ControllerError> {
        let payload = creation_payload(agent);
        info!(
            "Creating Harness agent {} (identifier {:?}) in account {:?}",
            payload.name, payload.identifier, payload.account_identifier
        );

        let created = self
            .client
            .create_agent(&payload)
            .await
            .map_err(|e| ControllerError::remote("create agent", e))?;

        agent.status_mut().at_provider.state = health_state(&created);

        let mut connection_details = ConnectionDetails::new();
        if let Some(key) = created.credentials.and_then(|c| c.private_key) {
            connection_details.insert(PRIVATE_KEY_DETAIL.to_string(), key.into_bytes());
        }
        Ok(ExternalCreation { connection_details })
    }

    async fn update(&self, _agent: &mut Agent) -> Result<ExternalUpdate, ControllerError> {
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, agent: &mut Agent) -> Result<(), ControllerError> {
        debug!("Leaving Harness agent {} in place", agent.spec.for_provider.identifier);
        Ok(())
    }
}
