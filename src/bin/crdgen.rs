//! # CRD Generator
//!
//! Prints the CustomResourceDefinitions owned by the controller as a
//! multi-document YAML stream.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/atlas-connection-controller.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::Result;
use atlas_connection_controller::crd::{AtlasAuditing, AtlasDatabaseUser};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    for crd in [AtlasDatabaseUser::crd(), AtlasAuditing::crd()] {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
