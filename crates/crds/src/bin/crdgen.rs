//! Prints the provider CRDs as a multi-document YAML stream
//!
//! `cargo run -p crds --bin crdgen > package/crds.yaml`

use crds::{Agent, ProviderConfig, ProviderConfigUsage};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    for crd in [Agent::crd(), ProviderConfig::crd(), ProviderConfigUsage::crd()] {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
