//! Test utilities for unit testing the controller
//!
//! Helpers for building Agent resources and remote agents in known states.

use crds::{Agent, AgentParameters, AgentSpec, DeletionPolicy, ProviderConfigReference};
use harness_client::{AgentHealth, ComponentHealth, HealthStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Agent named `name` with identifier `name` and only the account set
pub fn create_test_agent(name: &str) -> Agent {
    create_test_agent_with(
        name,
        AgentParameters {
            account_identifier: Some("test-account".to_string()),
            identifier: name.to_string(),
            ..Default::default()
        },
    )
}

/// Agent named `name` with the given parameters
pub fn create_test_agent_with(name: &str, for_provider: AgentParameters) -> Agent {
    Agent {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: AgentSpec {
            provider_config_ref: ProviderConfigReference::default(),
            write_connection_secret_to_ref: None,
            deletion_policy: DeletionPolicy::Delete,
            for_provider,
        },
        status: None,
    }
}

/// Remote agent in account `test-account` reporting `status`
pub fn create_remote_agent(identifier: &str, status: Option<HealthStatus>) -> harness_client::Agent {
    harness_client::Agent {
        account_identifier: "test-account".to_string(),
        identifier: identifier.to_string(),
        name: identifier.to_string(),
        health: status.map(|status| AgentHealth {
            harness_gitops_agent: Some(ComponentHealth {
                status: Some(status),
                message: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
