//! Harness REST API Client
//!
//! A Rust client library for the Harness GitOps agent API.
//!
//! # Example
//!
//! ```no_run
//! use harness_client::{Agent, HarnessClient, HarnessClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HarnessClient::new(HarnessClientConfig::default(), "pat.xxx".to_string())?;
//!
//! let agent = client.get_agent("my-agent", "my-account").await?;
//! println!("health: {:?}", agent.health_status());
//!
//! let created = client
//!     .create_agent(&Agent {
//!         account_identifier: "my-account".to_string(),
//!         identifier: "other-agent".to_string(),
//!         name: "other-agent".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//! # let _ = created;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Authentication**: `x-api-key`, read from `HARNESS_API_KEY` at call time
//!   with the constructor credentials as fallback
//! - **Retry Logic**: bounded retries with capped exponential backoff
//! - **Mocking**: `MockHarnessClient` behind the `test-util` feature

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod harness_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{API_KEY_ENV, DEFAULT_BASE_URL, HarnessClient, HarnessClientConfig};
pub use common::HttpClient;
pub use common::retry::RetryPolicy;
pub use error::HarnessError;
pub use harness_trait::HarnessClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockCall, MockFailure, MockHarnessClient};
pub use models::*;
