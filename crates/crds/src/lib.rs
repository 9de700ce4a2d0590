//! Harness Provider CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Harness GitOps agent
//! controller:
//! - `Agent` (`gitops.harness.crossplane.io/v1alpha1`): the managed resource
//! - `ProviderConfig` / `ProviderConfigUsage` (`harness.crossplane.io/v1alpha1`):
//!   credential configuration and its usage bookkeeping

pub mod agent;
pub mod conditions;
pub mod provider_config;
pub mod references;

pub use agent::*;
pub use conditions::*;
pub use provider_config::*;
pub use references::*;
