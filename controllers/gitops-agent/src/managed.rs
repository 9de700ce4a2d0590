//! Managed resource lifecycle.
//!
//! A managed resource is a Kubernetes object that stands for something living
//! outside the cluster. Each reconcile pass connects to the external system,
//! observes the resource there and then creates, updates or deletes it. The
//! traits here are the seams a resource kind plugs into; [`run_pass`] is the
//! decision logic shared by every kind.

use crate::error::ControllerError;
use async_trait::async_trait;
use crds::{Agent, Condition, DeletionPolicy, SecretReference};
use std::collections::BTreeMap;

/// Connection details published to the resource's connection secret
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Result of observing the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    /// Whether the external resource exists
    pub resource_exists: bool,
    /// Whether it matches the desired state
    pub resource_up_to_date: bool,
    pub connection_details: ConnectionDetails,
}

/// Result of creating the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

/// Result of updating the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Produces an [`ExternalClient`] for a resource, typically by resolving its
/// provider configuration and credentials.
#[async_trait]
pub trait ExternalConnecter<R: Send + Sync>: Send + Sync {
    async fn connect(&self, resource: &R) -> Result<Box<dyn ExternalClient<R>>, ControllerError>;
}

/// CRUD operations against the external system for one resource kind.
///
/// Operations may write the resource's status; they never change its spec.
#[async_trait]
pub trait ExternalClient<R: Send + Sync>: Send + Sync {
    async fn observe(&self, resource: &mut R) -> Result<ExternalObservation, ControllerError>;
    async fn create(&self, resource: &mut R) -> Result<ExternalCreation, ControllerError>;
    async fn update(&self, resource: &mut R) -> Result<ExternalUpdate, ControllerError>;
    async fn delete(&self, resource: &mut R) -> Result<(), ControllerError>;
}

/// Fields every managed resource exposes to the lifecycle
pub trait Managed {
    fn set_condition(&mut self, condition: Condition);
    fn deletion_policy(&self) -> DeletionPolicy;
    fn connection_secret_ref(&self) -> Option<&SecretReference>;
}

impl Managed for Agent {
    fn set_condition(&mut self, condition: Condition) {
        self.status_mut().set_condition(condition);
    }

    fn deletion_policy(&self) -> DeletionPolicy {
        self.spec.deletion_policy
    }

    fn connection_secret_ref(&self) -> Option<&SecretReference> {
        self.spec.write_connection_secret_to_ref.as_ref()
    }
}

/// What a pass did to the external resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalOperation {
    None,
    Created,
    Updated,
    Deleted,
    /// Deletion requested with the `Orphan` policy; nothing was contacted
    Orphaned,
}

impl ExternalOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Created => "create",
            Self::Updated => "update",
            Self::Deleted => "delete",
            Self::Orphaned => "orphan",
        }
    }
}

/// Outcome of a successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub operation: ExternalOperation,
    pub connection_details: ConnectionDetails,
}

impl PassOutcome {
    fn new(operation: ExternalOperation, connection_details: ConnectionDetails) -> Self {
        Self {
            operation,
            connection_details,
        }
    }
}

/// Runs one connect/observe/act pass over `resource`.
///
/// With `deleting` set, the external resource is deleted if it exists (or
/// left alone under the `Orphan` policy). Otherwise a missing resource is
/// created and a stale one updated. Conditions for `Ready` transitions are
/// written to `resource`; `Synced` is left to the caller.
pub async fn run_pass<R>(
    connecter: &dyn ExternalConnecter<R>,
    resource: &mut R,
    deleting: bool,
) -> Result<PassOutcome, ControllerError>
where
    R: Managed + Send + Sync,
{
    if deleting && resource.deletion_policy() == DeletionPolicy::Orphan {
        resource.set_condition(Condition::deleting());
        return Ok(PassOutcome::new(ExternalOperation::Orphaned, ConnectionDetails::new()));
    }

    let client = connecter.connect(resource).await?;
    let observation = client.observe(resource).await?;
    let mut details = observation.connection_details;

    if deleting {
        resource.set_condition(Condition::deleting());
        if !observation.resource_exists {
            return Ok(PassOutcome::new(ExternalOperation::None, details));
        }
        client.delete(resource).await?;
        return Ok(PassOutcome::new(ExternalOperation::Deleted, details));
    }

    if !observation.resource_exists {
        resource.set_condition(Condition::creating());
        let creation = client.create(resource).await?;
        details.extend(creation.connection_details);
        return Ok(PassOutcome::new(ExternalOperation::Created, details));
    }

    if !observation.resource_up_to_date {
        let update = client.update(resource).await?;
        details.extend(update.connection_details);
        return Ok(PassOutcome::new(ExternalOperation::Updated, details));
    }

    Ok(PassOutcome::new(ExternalOperation::None, details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_agent;
    use crds::{ConditionReason, ConditionType, get_condition};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Script {
        exists: bool,
        up_to_date: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    struct FakeClient(Arc<Script>);

    #[async_trait]
    impl ExternalClient<Agent> for FakeClient {
        async fn observe(&self, _: &mut Agent) -> Result<ExternalObservation, ControllerError> {
            self.0.calls.lock().unwrap().push("observe");
            Ok(ExternalObservation {
                resource_exists: self.0.exists,
                resource_up_to_date: self.0.up_to_date,
                connection_details: ConnectionDetails::new(),
            })
        }

        async fn create(&self, _: &mut Agent) -> Result<ExternalCreation, ControllerError> {
            self.0.calls.lock().unwrap().push("create");
            Ok(ExternalCreation {
                connection_details: BTreeMap::from([("privateKey".to_string(), b"k".to_vec())]),
            })
        }

        async fn update(&self, _: &mut Agent) -> Result<ExternalUpdate, ControllerError> {
            self.0.calls.lock().unwrap().push("update");
            Ok(ExternalUpdate::default())
        }

        async fn delete(&self, _: &mut Agent) -> Result<(), ControllerError> {
            self.0.calls.lock().unwrap().push("delete");
            Ok(())
        }
    }

    struct FakeConnecter {
        script: Arc<Script>,
        fail: bool,
    }

    #[async_trait]
    impl ExternalConnecter<Agent> for FakeConnecter {
        async fn connect(&self, _: &Agent) -> Result<Box<dyn ExternalClient<Agent>>, ControllerError> {
            self.script.calls.lock().unwrap().push("connect");
            if self.fail {
                return Err(ControllerError::CredentialExtraction("no secret".to_string()));
            }
            Ok(Box::new(FakeClient(self.script.clone())))
        }
    }

    fn connecter(exists: bool, up_to_date: bool) -> FakeConnecter {
        FakeConnecter {
            script: Arc::new(Script {
                exists,
                up_to_date,
                ..Default::default()
            }),
            fail: false,
        }
    }

    fn calls(c: &FakeConnecter) -> Vec<&'static str> {
        c.script.calls.lock().unwrap().clone()
    }

    fn ready_reason(agent: &Agent) -> Option<ConditionReason> {
        let status = agent.status.as_ref()?;
        get_condition(&status.conditions, ConditionType::Ready).map(|c| c.reason.clone())
    }

    #[tokio::test]
    async fn test_missing_resource_is_created() {
        let c = connecter(false, false);
        let mut agent = create_test_agent("agent1");

        let outcome = run_pass(&c, &mut agent, false).await.unwrap();

        assert_eq!(outcome.operation, ExternalOperation::Created);
        assert_eq!(outcome.connection_details.get("privateKey"), Some(&b"k".to_vec()));
        assert_eq!(calls(&c), vec!["connect", "observe", "create"]);
        assert_eq!(ready_reason(&agent), Some(ConditionReason::Creating));
    }

    #[tokio::test]
    async fn test_up_to_date_resource_is_left_alone() {
        let c = connecter(true, true);
        let mut agent = create_test_agent("agent1");

        let outcome = run_pass(&c, &mut agent, false).await.unwrap();

        assert_eq!(outcome.operation, ExternalOperation::None);
        assert_eq!(calls(&c), vec!["connect", "observe"]);
    }

    #[tokio::test]
    async fn test_stale_resource_is_updated() {
        let c = connecter(true, false);
        let mut agent = create_test_agent("agent1");

        let outcome = run_pass(&c, &mut agent, false).await.unwrap();

        assert_eq!(outcome.operation, ExternalOperation::Updated);
        assert_eq!(calls(&c), vec!["connect", "observe", "update"]);
    }

    #[tokio::test]
    async fn test_deletion_deletes_existing_resource() {
        let c = connecter(true, true);
        let mut agent = create_test_agent("agent1");

        let outcome = run_pass(&c, &mut agent, true).await.unwrap();

        assert_eq!(outcome.operation, ExternalOperation::Deleted);
        assert_eq!(calls(&c), vec!["connect", "observe", "delete"]);
        assert_eq!(ready_reason(&agent), Some(ConditionReason::Deleting));
    }

    #[tokio::test]
    async fn test_deletion_of_absent_resource_skips_delete() {
        let c = connecter(false, false);
        let mut agent = create_test_agent("agent1");

        let outcome = run_pass(&c, &mut agent, true).await.unwrap();

        assert_eq!(outcome.operation, ExternalOperation::None);
        assert_eq!(calls(&c), vec!["connect", "observe"]);
    }

    #[tokio::test]
    async fn test_orphan_policy_never_connects() {
        let c = connecter(true, true);
        let mut agent = create_test_agent("agent1");
        agent.spec.deletion_policy = DeletionPolicy::Orphan;

        let outcome = run_pass(&c, &mut agent, true).await.unwrap();

        assert_eq!(outcome.operation, ExternalOperation::Orphaned);
        assert!(calls(&c).is_empty());
    }

    #[tokio::test]
    async fn test_connect_error_stops_the_pass() {
        let mut c = connecter(false, false);
        c.fail = true;
        let mut agent = create_test_agent("agent1");

        let err = run_pass(&c, &mut agent, false).await.unwrap_err();

        assert!(matches!(err, ControllerError::CredentialExtraction(_)));
        assert_eq!(calls(&c), vec!["connect"]);
    }
}
