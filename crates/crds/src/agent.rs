//! Agent Custom Resource Definition
//!
//! Declares a Harness GitOps agent. The controller mirrors the agent's health
//! back into `status.atProvider.state` and the `Ready` condition.

use crate::conditions::{set_condition, Condition};
use crate::references::{ProviderConfigReference, SecretReference};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annotation holding the identifier of the external resource
pub const EXTERNAL_NAME_ANNOTATION: &str = "crossplane.io/external-name";

/// Configurable fields of an Agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentParameters {
    /// Account identifier for the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_identifier: Option<String>,

    /// Project identifier for the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_identifier: Option<String>,

    /// Organization identifier for the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_identifier: Option<String>,

    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    /// Agent identifier, unique within the account
    pub identifier: String,
}

/// What happens to the external resource when the Agent is deleted
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Delete the external resource
    #[default]
    Delete,
    /// Leave the external resource in place
    Orphan,
}

/// AgentSpec defines the desired state of an Agent
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gitops.harness.crossplane.io",
    version = "v1alpha1",
    kind = "Agent",
    status = "AgentStatus",
    category = "crossplane",
    category = "managed",
    category = "harness",
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"EXTERNAL-NAME","type":"string","jsonPath":".metadata.annotations.crossplane\\.io/external-name"}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// ProviderConfig supplying credentials for this resource
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    /// Secret to which connection details are written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,

    /// Deletion policy for the external resource
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,

    /// Desired agent parameters
    pub for_provider: AgentParameters,
}

/// Observable fields of an Agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentObservation {
    /// Health status reported by Harness (e.g. `HEALTHY`)
    #[serde(default)]
    pub state: String,
}

/// AgentStatus represents the observed state of an Agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    /// Ready and Synced conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Fields observed on the external resource
    #[serde(default)]
    pub at_provider: AgentObservation,
}

impl AgentStatus {
    /// Sets a condition, replacing any existing one of the same type
    pub fn set_condition(&mut self, condition: Condition) {
        set_condition(&mut self.conditions, condition);
    }
}

impl Agent {
    /// Status, created empty on first access
    pub fn status_mut(&mut self) -> &mut AgentStatus {
        self.status.get_or_insert_with(AgentStatus::default)
    }

    /// Name of the referenced ProviderConfig
    pub fn provider_config_name(&self) -> &str {
        &self.spec.provider_config_ref.name
    }

    /// Value of the external-name annotation, if any
    pub fn external_name(&self) -> Option<&str> {
        self.annotations()
            .get(EXTERNAL_NAME_ANNOTATION)
            .map(String::as_str)
    }
}
