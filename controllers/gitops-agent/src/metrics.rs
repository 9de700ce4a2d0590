//! Prometheus metrics and the HTTP endpoint serving them alongside the
//! liveness and readiness probes.

use crate::error::ControllerError;
use crate::managed::ExternalOperation;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder, histogram_opts, opts};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::info;

/// Controller metrics
#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub external_operations: IntCounterVec,
    pub reconcile_duration: HistogramVec,
}

impl Metrics {
    /// Creates the metrics and registers them with `registry`
    pub fn new(registry: &Registry) -> Result<Self, ControllerError> {
        let reconciliations = IntCounter::new(
            "gitops_agent_reconciliations_total",
            "Agent reconcile passes started",
        )?;
        let failures = IntCounterVec::new(
            opts!("gitops_agent_reconcile_errors_total", "Agent reconcile passes that failed"),
            &["error"],
        )?;
        let external_operations = IntCounterVec::new(
            opts!(
                "gitops_agent_external_operations_total",
                "Create, update and delete operations performed against Harness"
            ),
            &["operation"],
        )?;
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "gitops_agent_reconcile_duration_seconds",
                "Duration of Agent reconcile passes in seconds"
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["kind"],
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(external_operations.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        Ok(Self {
            reconciliations,
            failures,
            external_operations,
            reconcile_duration,
        })
    }

    /// Counts a pass and measures it until the returned guard is dropped
    pub fn count_and_measure(&self, kind: &str) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
            kind: kind.to_string(),
        }
    }

    pub fn reconcile_failure(&self, error: &ControllerError) {
        self.failures.with_label_values(&[error.metric_label()]).inc();
    }

    /// Counts an operation; passes that changed nothing are not counted
    pub fn external_operation(&self, operation: ExternalOperation) {
        if operation != ExternalOperation::None {
            self.external_operations
                .with_label_values(&[operation.as_str()])
                .inc();
        }
    }
}

/// Records the elapsed time of a pass on drop
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
    kind: String,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        self.metric
            .with_label_values(&[self.kind.as_str()])
            .observe(self.start.elapsed().as_secs_f64());
    }
}

/// Shared state of the probe server
#[derive(Clone)]
pub struct ServerState {
    registry: Registry,
    ready: Arc<AtomicBool>,
}

impl ServerState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks the controller ready; `/readyz` answers 200 from then on
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Encodes every metric in `registry` in the text exposition format
pub fn render(registry: &Registry) -> Result<String, ControllerError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ControllerError::Metrics(prometheus::Error::Msg(e.to_string())))
}

async fn metrics_handler(State(state): State<ServerState>) -> Result<String, (StatusCode, String)> {
    render(&state.registry).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    if state.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// Serves [`router`] on `listener` until the task is dropped
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<(), ControllerError> {
    info!("Metrics server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
