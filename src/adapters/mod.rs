//! Boundary traits and their Kubernetes implementations
//!
//! The reconcilers only ever see these traits; the live implementations
//! talk to the API server and the storage backend.

mod cluster;
pub mod driver;
mod events;
mod snapshots;

#[cfg(test)]
pub(crate) mod testing;

pub use cluster::{ClusterOps, KubeClusterOps};
pub use driver::{MockDriver, RestoreDriver};
pub use events::{EventSink, KubeEventSink};
pub use snapshots::{KubeSnapshotProvider, SnapshotInfo, SnapshotProvider};
