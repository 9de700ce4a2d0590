//! Object references shared by the provider CRDs
//!
//! These mirror the Crossplane common types so that manifests written for the
//! upstream provider keep working: a managed resource names its
//! `ProviderConfig`, a `ProviderConfig` names the Secret holding credentials,
//! and a usage record points back at the managed resource using it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the `ProviderConfig` used when a resource does not set one
pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

/// Reference to a cluster-scoped `ProviderConfig`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigReference {
    /// Name of the referenced ProviderConfig
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_CONFIG.to_string(),
        }
    }
}

/// Namespaced reference to a Secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the secret
    pub name: String,

    /// Namespace of the secret
    pub namespace: String,
}

/// Selects one key of a namespaced Secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the secret
    pub name: String,

    /// Namespace of the secret
    pub namespace: String,

    /// Key whose value is selected
    pub key: String,
}

impl SecretKeySelector {
    /// `namespace/name[key]`, used in log lines and error messages
    pub fn describe(&self) -> String {
        format!("{}/{}[{}]", self.namespace, self.name, self.key)
    }
}

/// Reference to any Kubernetes object by apiVersion, kind, name and uid
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypedReference {
    /// API version of the referent
    pub api_version: String,

    /// Kind of the referent
    pub kind: String,

    /// Name of the referent
    pub name: String,

    /// UID of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
