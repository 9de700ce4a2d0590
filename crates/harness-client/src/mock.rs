//! Mock HarnessClient for unit testing
//!
//! Stores agents in memory keyed by `(account, identifier)`, records every
//! call, and can be told to fail the next request.

use crate::error::HarnessError;
use crate::harness_trait::HarnessClientTrait;
use crate::models::{Agent, AgentHealth, ComponentHealth, HealthStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `get_agent(identifier, account_identifier)`
    GetAgent { identifier: String, account_identifier: String },
    /// `create_agent(payload)`
    CreateAgent(Agent),
}

/// Failure the mock returns instead of answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// `HarnessError::Api`
    Api(String),
    /// `HarnessError::Authentication`
    Authentication(String),
}

impl From<MockFailure> for HarnessError {
    fn from(value: MockFailure) -> Self {
        match value {
            MockFailure::Api(msg) => HarnessError::Api(msg),
            MockFailure::Authentication(msg) => HarnessError::Authentication(msg),
        }
    }
}

/// Mock HarnessClient for testing
#[derive(Debug, Clone)]
pub struct MockHarnessClient {
    base_url: String,
    agents: Arc<Mutex<HashMap<(String, String), Agent>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    failure: Arc<Mutex<Option<MockFailure>>>,
    created_health: Arc<Mutex<HealthStatus>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockHarnessClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agents: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            created_health: Arc::new(Mutex::new(HealthStatus::Healthy)),
        }
    }

    /// Add an agent to the mock store (for test setup)
    pub fn add_agent(&self, agent: Agent) {
        lock(&self.agents).insert(
            (agent.account_identifier.clone(), agent.identifier.clone()),
            agent,
        );
    }

    /// Fail the next call with the given error
    pub fn fail_next(&self, failure: MockFailure) {
        *lock(&self.failure) = Some(failure);
    }

    /// Health status stamped on agents created through the mock
    pub fn set_created_health(&self, status: HealthStatus) {
        *lock(&self.created_health) = status;
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Payloads passed to `create_agent`
    pub fn created_agents(&self) -> Vec<Agent> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                MockCall::CreateAgent(a) => Some(a.clone()),
                MockCall::GetAgent { .. } => None,
            })
            .collect()
    }

    fn take_failure(&self) -> Option<HarnessError> {
        lock(&self.failure).take().map(HarnessError::from)
    }
}

#[async_trait::async_trait]
impl HarnessClientTrait for MockHarnessClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_agent(&self, identifier: &str, account_identifier: &str) -> Result<Agent, HarnessError> {
        lock(&self.calls).push(MockCall::GetAgent {
            identifier: identifier.to_string(),
            account_identifier: account_identifier.to_string(),
        });
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        lock(&self.agents)
            .get(&(account_identifier.to_string(), identifier.to_string()))
            .cloned()
            .ok_or_else(|| HarnessError::NotFound(format!("Agent {} not found", identifier)))
    }

    async fn create_agent(&self, agent: &Agent) -> Result<Agent, HarnessError> {
        lock(&self.calls).push(MockCall::CreateAgent(agent.clone()));
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        let mut created = agent.clone();
        created.health = Some(AgentHealth {
            harness_gitops_agent: Some(ComponentHealth {
                status: Some(lock(&self.created_health).clone()),
                message: None,
            }),
            ..Default::default()
        });
        self.add_agent(created.clone());
        Ok(created)
    }
}
