//! Custom Resource Definitions for the Volume Restore Operator

pub mod bootstrap;
mod snapshot;
mod volume_snapshot_restore;

pub use snapshot::*;
pub use volume_snapshot_restore::*;

use kube::CustomResourceExt;

/// Generate the CRD YAML manifest installed by this operator
pub fn generate_crds() -> Vec<String> {
    vec![serde_yaml::to_string(&VolumeSnapshotRestore::crd()).unwrap()]
}
