//! Harness GitOps API models
//!
//! These models follow the `v1Agent` schema of the Harness GitOps service
//! (`/gitops/api/v1/agents`). Only the fields the controller reads or writes
//! are modelled; unknown fields are ignored on decode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// GitOps agent as returned by `GET /gitops/api/v1/agents/{identifier}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(default)]
    pub account_identifier: String,
    #[serde(default)]
    pub project_identifier: String,
    #[serde(default)]
    pub org_identifier: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AgentMetadata>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<AgentHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<AgentCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Agent {
    /// Health status of the in-cluster agent process, if reported
    pub fn health_status(&self) -> Option<&HealthStatus> {
        self.health
            .as_ref()
            .and_then(|h| h.harness_gitops_agent.as_ref())
            .and_then(|c| c.status.as_ref())
    }

    /// Whether the agent process reports `HEALTHY`
    pub fn is_healthy(&self) -> bool {
        matches!(self.health_status(), Some(HealthStatus::Healthy))
    }
}

/// Installation metadata of an agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    /// Namespace the agent runs in
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub high_availability: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_projects: Option<AppProjectMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_installation: Option<bool>,
}

/// Mapping of Argo app projects to Harness projects
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppProjectMapping {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub app_proj_map: BTreeMap<String, ProjectReference>,
}

/// Harness project an Argo app project maps to
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    #[serde(default)]
    pub account_identifier: String,
    #[serde(default)]
    pub org_identifier: String,
    #[serde(default)]
    pub project_identifier: String,
}

/// How the agent drives Argo CD
///
/// Agent types this client does not know about decode as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentType {
    ConnectedArgoProvider,
    ManagedArgoProvider,
    HostedArgoProvider,
    Other(String),
}

impl AgentType {
    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectedArgoProvider => "CONNECTED_ARGO_PROVIDER",
            Self::ManagedArgoProvider => "MANAGED_ARGO_PROVIDER",
            Self::HostedArgoProvider => "HOSTED_ARGO_PROVIDER",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for AgentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CONNECTED_ARGO_PROVIDER" => Self::ConnectedArgoProvider,
            "MANAGED_ARGO_PROVIDER" => Self::ManagedArgoProvider,
            "HOSTED_ARGO_PROVIDER" => Self::HostedArgoProvider,
            _ => Self::Other(value),
        }
    }
}

impl From<AgentType> for String {
    fn from(value: AgentType) -> Self {
        value.as_str().to_string()
    }
}

/// Health block of an agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harness_gitops_agent: Option<ComponentHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_status: Option<String>,
}

/// Health of one agent component
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Component health status
///
/// Values other than `HEALTHY`/`UNHEALTHY` are kept verbatim so they can be
/// mirrored into resource status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Other(String),
}

impl HealthStatus {
    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Unhealthy => "UNHEALTHY",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for HealthStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "HEALTHY" => Self::Healthy,
            "UNHEALTHY" => Self::Unhealthy,
            _ => Self::Other(value),
        }
    }
}

impl From<HealthStatus> for String {
    fn from(value: HealthStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials issued to the agent on creation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}
