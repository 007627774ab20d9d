//! CRD YAML Generator
//!
//! Generates the Kubernetes CRD manifest for the VolumeSnapshotRestore
//! resource.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/all.yaml

use volume_restore_operator::crd::generate_crds;

fn main() {
    for crd in generate_crds() {
        println!("---");
        print!("{}", crd);
    }
}
