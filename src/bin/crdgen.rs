//! # CRD Generator
//!
//! Prints the CustomResourceDefinition YAML of every kind served by the
//! provider, as one multi-document stream.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/all.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use harbor_provider::crd::{
    Project, ProviderConfig, ProviderConfigUsage, RobotAccount, ScannerRegistration, User,
    UserWithGeneratedPassword,
};
use kube::core::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [
        ProviderConfig::crd(),
        ProviderConfigUsage::crd(),
        RobotAccount::crd(),
        User::crd(),
        Project::crd(),
        ScannerRegistration::crd(),
        UserWithGeneratedPassword::crd(),
    ];

    for crd in crds {
        let name = crd.metadata.name.clone().unwrap_or_default();
        let yaml = serde_yaml::to_string(&crd)
            .with_context(|| format!("Failed to serialize CRD {name}"))?;
        println!("---");
        print!("{yaml}");
    }
    Ok(())
}
