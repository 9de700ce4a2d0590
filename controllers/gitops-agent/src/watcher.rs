//! Kubernetes resource watchers.
//!
//! Runs a `kube_runtime::Controller` over managed resources, which takes care
//! of reconnecting the watch, deduplicating events and requeueing.
//!
//! The watch stream is filtered on [`desired_state`] so that status-only
//! updates, including the controller's own condition patches, do not start
//! another pass. Periodic polling comes from the requeue of each pass.

use crate::error::ControllerError;
use crate::metrics::ServerState;
use crate::reconciler::Reconciler;
use crds::Agent;
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, WatchStreamExt, reflector, watcher};
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Hash of the metadata that expresses intent.
///
/// Covers generation, labels, annotations, finalizers and whether deletion
/// was requested. Finalizers are included because adding ours is followed
/// by `await_change`, and the resulting event must reach the controller.
fn desired_state<K: kube::Resource>(obj: &K) -> Option<u64> {
    let meta = obj.meta();
    let mut hasher = DefaultHasher::new();
    meta.generation.hash(&mut hasher);
    meta.labels.hash(&mut hasher);
    meta.annotations.hash(&mut hasher);
    meta.finalizers.hash(&mut hasher);
    meta.deletion_timestamp.is_some().hash(&mut hasher);
    Some(hasher.finish())
}

/// Marks `state` ready once the initial listing of the watch has completed
fn mark_ready_on_init<K>(state: ServerState) -> impl FnMut(&Result<watcher::Event<K>, watcher::Error>) {
    move |event: &Result<watcher::Event<K>, watcher::Error>| {
        if matches!(event, Ok(watcher::Event::InitDone)) && !state.is_ready() {
            info!("Initial watch list complete, controller ready");
            state.set_ready();
        }
    }
}

/// Generic watcher helper around `kube_runtime::Controller`.
///
/// `reconcile_fn` runs one pass; `error_fn` picks the requeue after a failed
/// one. The stream is drained until the process receives a shutdown signal.
async fn watch_resource<K, F, E>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    error_fn: E,
    resource_name: &'static str,
    concurrency: u16,
    state: ServerState,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
    E: Fn(&Reconciler, &K, &ControllerError) -> Action + Send + Sync + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| error_fn(&ctx, &obj, error);

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {:?}", resource_name, obj.meta().name);
            reconcile_fn(ctx, obj).await
        }
    };

    let (reader, writer) = reflector::store();
    let trigger = watcher(api, watcher::Config::default())
        .default_backoff()
        .inspect(mark_ready_on_init(state))
        .reflect(writer)
        .applied_objects()
        .predicate_filter(desired_state::<K>);

    // Debounce batches bursts of events
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(concurrency);

    Controller::for_stream(trigger, reader)
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {} {}", resource_name, obj.name),
                Err(e) => error!("Controller error for {}: {}", resource_name, e),
            }
        })
        .await;

    info!("{} watcher stopped", resource_name);
    Ok(())
}

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    agent_api: Api<Agent>,
    concurrency: u16,
    state: ServerState,
}

impl Watcher {
    /// Creates a new watcher instance; `state` turns ready once the watch has synced.
    pub fn new(reconciler: Arc<Reconciler>, agent_api: Api<Agent>, concurrency: u16, state: ServerState) -> Self {
        Self {
            reconciler,
            agent_api,
            concurrency,
            state,
        }
    }

    /// Watches Agent resources until shutdown.
    pub async fn watch_agents(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.agent_api.clone(),
            self.reconciler.clone(),
            |reconciler, agent| Box::pin(async move { reconciler.reconcile_agent(agent).await }),
            |reconciler, agent: &Agent, error| reconciler.error_action(agent, error),
            "Agent",
            self.concurrency,
            self.state.clone(),
        )
        .await
    }
}
