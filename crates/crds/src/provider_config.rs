//! ProviderConfig and ProviderConfigUsage Custom Resource Definitions
//!
//! A `ProviderConfig` tells the controller where Harness credentials live.
//! A `ProviderConfigUsage` records that a managed resource depends on a
//! `ProviderConfig`, so the config is not removed while still referenced.

use crate::references::{ProviderConfigReference, SecretKeySelector, TypedReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label on usage records naming the ProviderConfig in use
pub const PROVIDER_CONFIG_LABEL: &str = "crossplane.io/provider-config";

/// Where credentials are read from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum CredentialsSource {
    /// No credentials are extracted
    None,
    /// A key of a Kubernetes Secret
    #[default]
    Secret,
}

/// Credentials configuration of a ProviderConfig
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    /// Credentials source
    #[serde(default)]
    pub source: CredentialsSource,

    /// Secret key holding the credentials (required for `Secret`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
}

/// ProviderConfigSpec configures how the provider connects to Harness
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "harness.crossplane.io",
    version = "v1alpha1",
    kind = "ProviderConfig",
    category = "crossplane",
    category = "provider",
    category = "harness",
    printcolumn = r#"{"name":"SECRET-NAME","type":"string","jsonPath":".spec.credentials.secretRef.name","priority":1}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Credentials used to authenticate against Harness
    pub credentials: ProviderCredentials,
}

/// ProviderConfigUsageSpec links a managed resource to its ProviderConfig
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "harness.crossplane.io",
    version = "v1alpha1",
    kind = "ProviderConfigUsage",
    category = "crossplane",
    category = "provider",
    category = "harness",
    printcolumn = r#"{"name":"CONFIG-NAME","type":"string","jsonPath":".spec.providerConfigRef.name"}"#,
    printcolumn = r#"{"name":"RESOURCE-KIND","type":"string","jsonPath":".spec.resourceRef.kind"}"#,
    printcolumn = r#"{"name":"RESOURCE-NAME","type":"string","jsonPath":".spec.resourceRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    /// ProviderConfig being used
    pub provider_config_ref: ProviderConfigReference,

    /// Managed resource using it
    pub resource_ref: TypedReference,
}
