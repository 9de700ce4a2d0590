//! Reconciliation of Agent resources.
//!
//! Each pass runs under the managed-resource finalizer: live objects go
//! through connect/observe/create-or-update, objects being deleted through
//! connect/observe/delete before the finalizer is released. The outcome is
//! written back as the `Synced` condition, and connection details go to the
//! Secret named by `spec.writeConnectionSecretToRef`.
//!
//! External creates, deletes and orphans are recorded as Normal events on the
//! Agent; failed passes as Warning events.

use crate::backoff::BackoffTracker;
use crate::connector::FIELD_MANAGER;
use crate::error::ControllerError;
use crate::managed::{ConnectionDetails, ExternalConnecter, ExternalOperation, Managed, PassOutcome, run_pass};
use crate::metrics::Metrics;
use crds::{Agent, Condition, EXTERNAL_NAME_ANNOTATION};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use kube_runtime::finalizer::{Event as Finalizer, finalizer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Finalizer guarding external resources of managed resources
pub const AGENT_FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Secret type used for connection secrets
pub const CONNECTION_SECRET_TYPE: &str = "connection.crossplane.io/v1alpha1";

/// Requeue delay after a create, so the new agent is observed promptly
const CREATE_REQUEUE: Duration = Duration::from_secs(10);

/// Reconciles Agent resources.
pub struct Reconciler {
    agent_api: Api<Agent>,
    client: Client,
    connecter: Arc<dyn ExternalConnecter<Agent>>,
    metrics: Metrics,
    recorder: Recorder,
    poll_interval: Duration,
    backoff: BackoffTracker,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: Client,
        connecter: Arc<dyn ExternalConnecter<Agent>>,
        metrics: Metrics,
        poll_interval: Duration,
    ) -> Self {
        Self {
            agent_api: Api::all(client.clone()),
            recorder: Recorder::new(client.clone(), Reporter::from(FIELD_MANAGER)),
            client,
            connecter,
            metrics,
            poll_interval,
            backoff: BackoffTracker::new(),
        }
    }

    /// Runs one pass for `agent` under the finalizer
    pub async fn reconcile_agent(&self, agent: Arc<Agent>) -> Result<Action, ControllerError> {
        let _timer = self.metrics.count_and_measure("Agent");
        let name = agent.name_any();
        debug!("Reconciling Agent {}", name);

        let result = finalizer(&self.agent_api, AGENT_FINALIZER, agent.clone(), |event| async {
            match event {
                Finalizer::Apply(agent) => self.apply(&agent).await,
                Finalizer::Cleanup(agent) => self.cleanup(&agent).await,
            }
        })
        .await
        .map_err(|e| ControllerError::Finalizer(Box::new(e)));

        match result {
            Ok(action) => {
                self.backoff.reset(&name);
                Ok(action)
            }
            Err(e) => {
                self.publish(&agent, warning_event(&e)).await;
                Err(e)
            }
        }
    }

    /// Requeue decision after a failed pass
    pub fn error_action(&self, agent: &Agent, error: &ControllerError) -> Action {
        let name = agent.name_any();
        self.metrics.reconcile_failure(error);
        let (delay, count) = self.backoff.record_error(&name);
        warn!(
            "Agent {} failed to reconcile ({} consecutive errors), retrying in {}s: {}",
            name,
            count,
            delay.as_secs(),
            error
        );
        Action::requeue(delay)
    }

    async fn apply(&self, agent: &Agent) -> Result<Action, ControllerError> {
        let mut agent = agent.clone();
        let outcome = self.run(&mut agent, false).await?;

        if let Some(event) = operation_event(outcome.operation) {
            self.publish(&agent, event).await;
        }
        if outcome.operation == ExternalOperation::Created && agent.external_name().is_none() {
            self.set_external_name(&agent).await?;
        }
        self.publish_connection_details(&agent, &outcome.connection_details).await?;

        info!("Agent {} reconciled ({})", agent.name_any(), outcome.operation.as_str());
        Ok(requeue_after(outcome.operation, self.poll_interval))
    }

    async fn cleanup(&self, agent: &Agent) -> Result<Action, ControllerError> {
        let mut agent = agent.clone();
        let outcome = self.run(&mut agent, true).await?;
        if let Some(event) = operation_event(outcome.operation) {
            self.publish(&agent, event).await;
        }
        info!(
            "Agent {} released ({}), removing finalizer",
            agent.name_any(),
            outcome.operation.as_str()
        );
        Ok(Action::await_change())
    }

    /// Runs the pass and records its result in status either way
    async fn run(&self, agent: &mut Agent, deleting: bool) -> Result<PassOutcome, ControllerError> {
        match run_pass(self.connecter.as_ref(), agent, deleting).await {
            Ok(outcome) => {
                self.metrics.external_operation(outcome.operation);
                agent.set_condition(Condition::reconcile_success());
                self.patch_status(agent).await?;
                Ok(outcome)
            }
            Err(e) => {
                agent.set_condition(Condition::reconcile_error(e.to_string()));
                if let Err(patch_err) = self.patch_status(agent).await {
                    error!("Failed to record error on Agent {}: {}", agent.name_any(), patch_err);
                }
                Err(e)
            }
        }
    }

    /// Records an event on `agent`; failures are logged and otherwise ignored
    async fn publish(&self, agent: &Agent, event: Event) {
        if let Err(e) = self.recorder.publish(&event, &agent.object_ref(&())).await {
            warn!("Failed to publish {} event for Agent {}: {}", event.reason, agent.name_any(), e);
        }
    }

    async fn patch_status(&self, agent: &Agent) -> Result<(), ControllerError> {
        self.agent_api
            .patch_status(&agent.name_any(), &PatchParams::default(), &Patch::Merge(status_patch(agent)))
            .await?;
        Ok(())
    }

    async fn set_external_name(&self, agent: &Agent) -> Result<(), ControllerError> {
        self.agent_api
            .patch(&agent.name_any(), &PatchParams::default(), &Patch::Merge(external_name_patch(agent)))
            .await?;
        Ok(())
    }

    async fn publish_connection_details(
        &self,
        agent: &Agent,
        details: &ConnectionDetails,
    ) -> Result<(), ControllerError> {
        let Some(secret) = connection_secret(agent, details) else {
            return Ok(());
        };
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_any();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&secret))
            .await?;
        info!("Published connection details of Agent {} to {}/{}", agent.name_any(), namespace, name);
        Ok(())
    }
}

fn requeue_after(operation: ExternalOperation, poll_interval: Duration) -> Action {
    match operation {
        ExternalOperation::Created => Action::requeue(CREATE_REQUEUE),
        _ => Action::requeue(poll_interval),
    }
}

/// Normal event for an external operation, `None` when nothing changed remotely
fn operation_event(operation: ExternalOperation) -> Option<Event> {
    let (reason, note) = match operation {
        ExternalOperation::None => return None,
        ExternalOperation::Created => ("CreatedExternalResource", "Successfully requested creation of external resource"),
        ExternalOperation::Updated => ("UpdatedExternalResource", "Successfully requested update of external resource"),
        ExternalOperation::Deleted => ("DeletedExternalResource", "Successfully requested deletion of external resource"),
        ExternalOperation::Orphaned => ("OrphanedExternalResource", "External resource kept, deletion policy is Orphan"),
    };
    Some(Event {
        type_: EventType::Normal,
        reason: reason.to_string(),
        note: Some(note.to_string()),
        action: operation.as_str().to_string(),
        secondary: None,
    })
}

fn warning_event(error: &ControllerError) -> Event {
    Event {
        type_: EventType::Warning,
        reason: error.event_reason().to_string(),
        note: Some(error.to_string()),
        action: "reconcile".to_string(),
        secondary: None,
    }
}

fn status_patch(agent: &Agent) -> serde_json::Value {
    json!({ "status": agent.status })
}

fn external_name_patch(agent: &Agent) -> serde_json::Value {
    json!({
        "metadata": {
            "annotations": {
                EXTERNAL_NAME_ANNOTATION: agent.spec.for_provider.identifier,
            }
        }
    })
}

/// Connection secret for `agent`, if it asks for one and there is anything to write
fn connection_secret(agent: &Agent, details: &ConnectionDetails) -> Option<Secret> {
    let target = agent.connection_secret_ref()?;
    if details.is_empty() {
        return None;
    }

    let owner = agent.uid().map(|uid| OwnerReference {
        api_version: Agent::api_version(&()).into_owned(),
        kind: Agent::kind(&()).into_owned(),
        name: agent.name_any(),
        uid,
        controller: Some(true),
        ..Default::default()
    });

    Some(Secret {
        metadata: ObjectMeta {
            name: Some(target.name.clone()),
            namespace: Some(target.namespace.clone()),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        data: Some(
            details
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        type_: Some(CONNECTION_SECRET_TYPE.to_string()),
        ..Default::default()
    })
}
