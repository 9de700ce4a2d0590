//! Connects Agent resources to Harness.
//!
//! Connecting records that the Agent uses its ProviderConfig, reads the
//! ProviderConfig, extracts the credentials it points at and hands them to a
//! [`ClientFactory`]. The Kubernetes lookups sit behind
//! [`ProviderConfigResolver`] so the sequence can be exercised without a
//! cluster.

use crate::error::ControllerError;
use crate::external::AgentExternal;
use crate::managed::{ExternalClient, ExternalConnecter};
use async_trait::async_trait;
use crds::{
    Agent, CredentialsSource, PROVIDER_CONFIG_LABEL, ProviderConfig, ProviderConfigReference,
    ProviderConfigUsage, ProviderConfigUsageSpec, ProviderCredentials, TypedReference,
};
use harness_client::{HarnessClient, HarnessClientConfig, HarnessClientTrait, HarnessError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Field manager used for server-side applies
pub const FIELD_MANAGER: &str = "gitops-agent-controller";

/// Kubernetes-side lookups performed while connecting
#[async_trait]
pub trait ProviderConfigResolver: Send + Sync {
    /// Records that `agent` uses its ProviderConfig
    async fn track_usage(&self, agent: &Agent) -> Result<(), ControllerError>;

    /// Fetches the named ProviderConfig
    async fn provider_config(&self, name: &str) -> Result<ProviderConfig, ControllerError>;

    /// Reads the credential bundle described by `credentials`
    async fn extract_credentials(&self, credentials: &ProviderCredentials) -> Result<Vec<u8>, ControllerError>;
}

/// Builds Harness clients from a credential bundle
pub trait ClientFactory: Send + Sync {
    fn new_client(&self, credentials: &[u8]) -> Result<Arc<dyn HarnessClientTrait>, HarnessError>;
}

/// Resolver backed by the Kubernetes API
pub struct KubeProviderConfigResolver {
    client: Client,
}

impl KubeProviderConfigResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Usage record for `agent`, named after its UID and owned by it
fn usage_for(agent: &Agent) -> Result<ProviderConfigUsage, ControllerError> {
    let uid = agent
        .uid()
        .ok_or_else(|| ControllerError::UsageTracking(format!("Agent {} has no uid", agent.name_any())))?;
    let config_name = agent.provider_config_name().to_string();
    let api_version = Agent::api_version(&()).into_owned();
    let kind = Agent::kind(&()).into_owned();

    let mut usage = ProviderConfigUsage::new(
        &uid,
        ProviderConfigUsageSpec {
            provider_config_ref: ProviderConfigReference {
                name: config_name.clone(),
            },
            resource_ref: TypedReference {
                api_version: api_version.clone(),
                kind: kind.clone(),
                name: agent.name_any(),
                uid: Some(uid.clone()),
            },
        },
    );
    usage.metadata.labels = Some(BTreeMap::from([(PROVIDER_CONFIG_LABEL.to_string(), config_name)]));
    usage.metadata.owner_references = Some(vec![OwnerReference {
        api_version,
        kind,
        name: agent.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]);
    Ok(usage)
}

#[async_trait]
impl ProviderConfigResolver for KubeProviderConfigResolver {
    async fn track_usage(&self, agent: &Agent) -> Result<(), ControllerError> {
        let usage = usage_for(agent)?;
        let name = usage.name_any();
        let api: Api<ProviderConfigUsage> = Api::all(self.client.clone());
        api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&usage))
            .await
            .map_err(|e| ControllerError::UsageTracking(e.to_string()))?;
        debug!("Tracked ProviderConfig {} usage by Agent {}", agent.provider_config_name(), agent.name_any());
        Ok(())
    }

    async fn provider_config(&self, name: &str) -> Result<ProviderConfig, ControllerError> {
        let api: Api<ProviderConfig> = Api::all(self.client.clone());
        api.get(name)
            .await
            .map_err(|e| ControllerError::ConfigurationLookup(format!("{}: {}", name, e)))
    }

    async fn extract_credentials(&self, credentials: &ProviderCredentials) -> Result<Vec<u8>, ControllerError> {
        match credentials.source {
            CredentialsSource::None => Ok(Vec::new()),
            CredentialsSource::Secret => {
                let selector = credentials.secret_ref.as_ref().ok_or_else(|| {
                    ControllerError::CredentialExtraction("no secretRef for source Secret".to_string())
                })?;
                let api: Api<Secret> = Api::namespaced(self.client.clone(), &selector.namespace);
                let secret = api
                    .get(&selector.name)
                    .await
                    .map_err(|e| ControllerError::CredentialExtraction(format!("{}: {}", selector.describe(), e)))?;
                secret
                    .data
                    .and_then(|mut data| data.remove(&selector.key))
                    .map(|bytes| bytes.0)
                    .ok_or_else(|| {
                        ControllerError::CredentialExtraction(format!("{}: key not found", selector.describe()))
                    })
            }
        }
    }
}

/// Builds [`HarnessClient`]s sharing one configuration
pub struct HarnessClientFactory {
    config: HarnessClientConfig,
}

impl HarnessClientFactory {
    pub fn new(config: HarnessClientConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for HarnessClientFactory {
    fn new_client(&self, credentials: &[u8]) -> Result<Arc<dyn HarnessClientTrait>, HarnessError> {
        let key = std::str::from_utf8(credentials)
            .map_err(|e| HarnessError::InvalidRequest(format!("credentials are not valid UTF-8: {}", e)))?
            .trim()
            .to_string();
        Ok(Arc::new(HarnessClient::new(self.config.clone(), key)?))
    }
}

/// [`ExternalConnecter`] for Agents
pub struct Connector {
    resolver: Arc<dyn ProviderConfigResolver>,
    factory: Arc<dyn ClientFactory>,
}

impl Connector {
    pub fn new(resolver: Arc<dyn ProviderConfigResolver>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { resolver, factory }
    }
}

#[async_trait]
impl ExternalConnecter<Agent> for Connector {
    async fn connect(&self, agent: &Agent) -> Result<Box<dyn ExternalClient<Agent>>, ControllerError> {
        self.resolver.track_usage(agent).await?;
        let config = self.resolver.provider_config(agent.provider_config_name()).await?;
        let credentials = self.resolver.extract_credentials(&config.spec.credentials).await?;
        let client = self
            .factory
            .new_client(&credentials)
            .map_err(|e| ControllerError::ClientConstruction(e.to_string()))?;
        Ok(Box::new(AgentExternal::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_remote_agent, create_test_agent};
    use crds::{ProviderConfigSpec, SecretKeySelector};
    use harness_client::{HealthStatus, MockHarnessClient};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeResolver {
        fail_usage: bool,
        missing_config: bool,
        missing_secret: bool,
        steps: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProviderConfigResolver for FakeResolver {
        async fn track_usage(&self, agent: &Agent) -> Result<(), ControllerError> {
            self.steps.lock().unwrap().push("track".to_string());
            if self.fail_usage {
                return Err(ControllerError::UsageTracking("forbidden".to_string()));
            }
            usage_for(agent).map(|_| ())
        }

        async fn provider_config(&self, name: &str) -> Result<ProviderConfig, ControllerError> {
            self.steps.lock().unwrap().push(format!("config:{}", name));
            if self.missing_config {
                return Err(ControllerError::ConfigurationLookup(format!("{}: not found", name)));
            }
            Ok(ProviderConfig::new(
                name,
                ProviderConfigSpec {
                    credentials: ProviderCredentials {
                        source: CredentialsSource::Secret,
                        secret_ref: Some(SecretKeySelector {
                            name: "harness-creds".to_string(),
                            namespace: "crossplane-system".to_string(),
                            key: "credentials".to_string(),
                        }),
                    },
                },
            ))
        }

        async fn extract_credentials(&self, credentials: &ProviderCredentials) -> Result<Vec<u8>, ControllerError> {
            self.steps.lock().unwrap().push("extract".to_string());
            let selector = credentials.secret_ref.as_ref().unwrap();
            if self.missing_secret {
                return Err(ControllerError::CredentialExtraction(format!(
                    "{}: not found",
                    selector.describe()
                )));
            }
            Ok(b"pat.abc".to_vec())
        }
    }

    struct CountingFactory {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<u8>>>,
        fail: bool,
        mock: MockHarnessClient,
    }

    impl CountingFactory {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                fail,
                mock: MockHarnessClient::new("http://mock"),
            }
        }
    }

    impl ClientFactory for CountingFactory {
        fn new_client(&self, credentials: &[u8]) -> Result<Arc<dyn HarnessClientTrait>, HarnessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(credentials.to_vec());
            if self.fail {
                return Err(HarnessError::InvalidRequest("bad credentials".to_string()));
            }
            Ok(Arc::new(self.mock.clone()))
        }
    }

    fn connector(resolver: FakeResolver, factory: CountingFactory) -> (Connector, Arc<FakeResolver>, Arc<CountingFactory>) {
        let resolver = Arc::new(resolver);
        let factory = Arc::new(factory);
        (Connector::new(resolver.clone(), factory.clone()), resolver, factory)
    }

    #[tokio::test]
    async fn test_connect_resolves_in_order_and_builds_client() {
        let (connector, resolver, factory) = connector(FakeResolver::default(), CountingFactory::new(false));
        factory.mock.add_agent(create_remote_agent("agent1", Some(HealthStatus::Healthy)));
        let mut agent = create_test_agent("agent1");

        let client = connector.connect(&agent).await.unwrap();

        assert_eq!(*resolver.steps.lock().unwrap(), vec!["track", "config:default", "extract"]);
        assert_eq!(*factory.seen.lock().unwrap(), vec![b"pat.abc".to_vec()]);
        assert!(client.observe(&mut agent).await.unwrap().resource_exists);
    }

    #[tokio::test]
    async fn test_missing_secret_never_builds_a_client() {
        let resolver = FakeResolver {
            missing_secret: true,
            ..Default::default()
        };
        let (connector, _, factory) = connector(resolver, CountingFactory::new(false));

        let err = connector.connect(&create_test_agent("agent1")).await.err().unwrap();

        assert!(matches!(err, ControllerError::CredentialExtraction(_)), "got {err:?}");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_provider_config_is_lookup_error() {
        let resolver = FakeResolver {
            missing_config: true,
            ..Default::default()
        };
        let (connector, resolver, factory) = connector(resolver, CountingFactory::new(false));

        let err = connector.connect(&create_test_agent("agent1")).await.err().unwrap();

        assert!(matches!(err, ControllerError::ConfigurationLookup(_)), "got {err:?}");
        assert_eq!(*resolver.steps.lock().unwrap(), vec!["track", "config:default"]);
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_usage_failure_stops_connect() {
        let resolver = FakeResolver {
            fail_usage: true,
            ..Default::default()
        };
        let (connector, resolver, _) = connector(resolver, CountingFactory::new(false));

        let err = connector.connect(&create_test_agent("agent1")).await.err().unwrap();

        assert!(matches!(err, ControllerError::UsageTracking(_)), "got {err:?}");
        assert_eq!(resolver.steps.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_factory_failure_is_client_construction_error() {
        let (connector, _, factory) = connector(FakeResolver::default(), CountingFactory::new(true));

        let err = connector.connect(&create_test_agent("agent1")).await.err().unwrap();

        assert!(matches!(err, ControllerError::ClientConstruction(_)), "got {err:?}");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_usage_record_points_back_at_agent() {
        let usage = usage_for(&create_test_agent("agent1")).unwrap();

        assert_eq!(usage.name_any(), "uid-agent1");
        assert_eq!(usage.spec.provider_config_ref.name, "default");
        assert_eq!(usage.spec.resource_ref.kind, "Agent");
        assert_eq!(usage.spec.resource_ref.api_version, "gitops.harness.crossplane.io/v1alpha1");
        assert_eq!(usage.labels().get(PROVIDER_CONFIG_LABEL).map(String::as_str), Some("default"));
        let owner = &usage.owner_references()[0];
        assert_eq!(owner.uid, "uid-agent1");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_usage_requires_uid() {
        let mut agent = create_test_agent("agent1");
        agent.metadata.uid = None;
        assert!(matches!(usage_for(&agent), Err(ControllerError::UsageTracking(_))));
    }

    #[test]
    fn test_factory_rejects_non_utf8_credentials() {
        let factory = HarnessClientFactory::new(HarnessClientConfig::default());
        assert!(factory.new_client(&[0xff, 0xfe]).is_err());
        assert!(factory.new_client(b"pat.abc\n").is_ok());
    }
}
