//! Kubernetes controllers for the Volume Restore Operator

mod restore_controller;

pub use restore_controller::run as run_restore_controller;

use std::sync::Arc;

use kube::Client;

use crate::adapters::{
    ClusterOps, EventSink, KubeClusterOps, KubeEventSink, KubeSnapshotProvider, RestoreDriver,
    SnapshotProvider,
};
use crate::reconcilers::RestoreReconciler;

/// Shared context for the controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Cluster object operations
    pub cluster: Arc<dyn ClusterOps>,
    /// Snapshot source resolution
    pub snapshots: Arc<dyn SnapshotProvider>,
    /// Data-plane restore driver
    pub driver: Arc<dyn RestoreDriver>,
    /// Event emission
    pub events: Arc<dyn EventSink>,
}

impl Context {
    /// Create a context wired to the live cluster
    pub fn new(client: Client, driver: Arc<dyn RestoreDriver>) -> Self {
        Self {
            cluster: Arc::new(KubeClusterOps::new(client.clone())),
            snapshots: Arc::new(KubeSnapshotProvider::new(client.clone())),
            events: Arc::new(KubeEventSink::new(client.clone())),
            client,
            driver,
        }
    }

    /// State machine over this context's adapters
    pub fn reconciler(&self) -> RestoreReconciler {
        RestoreReconciler::new(
            self.cluster.clone(),
            self.snapshots.clone(),
            self.driver.clone(),
            self.events.clone(),
        )
    }
}
