//! Harness API client
//!
//! Implements the subset of the Harness GitOps agent API the controller needs:
//! `GET /gitops/api/v1/agents/{identifier}` and `POST /gitops/api/v1/agents`.

use crate::common::retry::RetryPolicy;
use crate::common::HttpClient;
use crate::error::HarnessError;
use crate::harness_trait::HarnessClientTrait;
use crate::models::Agent;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default Harness SaaS endpoint
pub const DEFAULT_BASE_URL: &str = "https://app.harness.io";

/// Environment variable consulted for the API key on every request
pub const API_KEY_ENV: &str = "HARNESS_API_KEY";

const AGENTS_PATH: &str = "/gitops/api/v1/agents";

/// Connection settings for [`HarnessClient`]
#[derive(Debug, Clone)]
pub struct HarnessClientConfig {
    /// Base URL, e.g. `https://app.harness.io`
    pub base_url: String,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
    /// Environment variable holding the API key; `None` disables the lookup
    pub api_key_env: Option<String>,
}

impl Default for HarnessClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            api_key_env: Some(API_KEY_ENV.to_string()),
        }
    }
}

/// Harness API client
#[derive(Debug)]
pub struct HarnessClient {
    http: HttpClient,
}

impl HarnessClient {
    /// Create a new Harness client
    ///
    /// # Arguments
    /// * `config` - Endpoint, timeout and retry settings
    /// * `credentials` - API key extracted from the ProviderConfig secret,
    ///   used when the API key environment variable is unset
    pub fn new(config: HarnessClientConfig, credentials: String) -> Result<Self, HarnessError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(HarnessError::Http)?;

        Ok(Self {
            http: HttpClient::new(
                client,
                config.base_url,
                credentials,
                config.api_key_env,
                config.retry,
            ),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Get an agent by identifier within an account
    ///
    /// # Returns
    /// * `Ok(Agent)` - The agent
    /// * `Err(HarnessError::NotFound)` - No agent with that identifier
    /// * `Err(HarnessError)` - Any other failure
    pub async fn get_agent(&self, identifier: &str, account_identifier: &str) -> Result<Agent, HarnessError> {
        if identifier.is_empty() {
            return Err(HarnessError::InvalidRequest("agent identifier is empty".to_string()));
        }
        debug!("Fetching agent {} in account {}", identifier, account_identifier);

        let query = HttpClient::build_query_string(&[("accountIdentifier", account_identifier)]);
        let path = format!("{}/{}?{}", AGENTS_PATH, urlencoding::encode(identifier), query);
        self.http.get(&path).await
    }

    /// Create an agent
    ///
    /// # Returns
    /// * `Ok(Agent)` - The created agent as returned by Harness
    /// * `Err(HarnessError)` - If the request fails
    pub async fn create_agent(&self, agent: &Agent) -> Result<Agent, HarnessError> {
        debug!("Creating agent {} in account {}", agent.name, agent.account_identifier);

        let query = HttpClient::build_query_string(&[("accountIdentifier", &agent.account_identifier)]);
        let path = if query.is_empty() {
            AGENTS_PATH.to_string()
        } else {
            format!("{}?{}", AGENTS_PATH, query)
        };
        let body = serde_json::to_value(agent)?;
        self.http.post(&path, &body).await
    }
}

#[async_trait::async_trait]
impl HarnessClientTrait for HarnessClient {
    fn base_url(&self) -> &str {
        HarnessClient::base_url(self)
    }

    async fn get_agent(&self, identifier: &str, account_identifier: &str) -> Result<Agent, HarnessError> {
        HarnessClient::get_agent(self, identifier, account_identifier).await
    }

    async fn create_agent(&self, agent: &Agent) -> Result<Agent, HarnessError> {
        HarnessClient::create_agent(self, agent).await
    }
}
