//! HarnessClient trait for mocking
//!
//! This trait abstracts the HarnessClient so reconcilers can be unit tested
//! against an in-memory implementation.

use crate::error::HarnessError;
use crate::models::Agent;

/// Trait for Harness API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait HarnessClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Get an agent by identifier within an account
    async fn get_agent(&self, identifier: &str, account_identifier: &str) -> Result<Agent, HarnessError>;

    /// Create an agent
    async fn create_agent(&self, agent: &Agent) -> Result<Agent, HarnessError>;
}
