//! Snapshot provider boundary
//!
//! Resolves restore sources: a single snapshot by name, its readiness, or
//! the member set of a group snapshot.

use std::time::Duration;

use async_trait::async_trait;
use kube::{api::ListParams, Api, Client, ResourceExt};
use tracing::debug;

use crate::crd::{VolumeSnapshot, GROUP_SNAPSHOT_LABEL};
use crate::error::{Error, Result};

/// Resolved snapshot source for one volume
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub name: String,
    pub namespace: String,
    /// Claim the snapshot was taken from
    pub pvc_name: String,
    /// Snapshot data reference handed to the driver
    pub snapshot_data: String,
}

/// Read-only access to snapshot objects
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Resolve a single snapshot by name and namespace
    async fn get_snapshot(&self, name: &str, namespace: &str) -> Result<SnapshotInfo>;

    /// Poll until the snapshot reports ready, bounded by `timeout`
    async fn validate_snapshot(
        &self,
        name: &str,
        namespace: &str,
        retry: Duration,
        timeout: Duration,
    ) -> Result<()>;

    /// Resolve every member snapshot of a named group snapshot
    async fn group_snapshots(&self, group: &str, namespace: &str) -> Result<Vec<SnapshotInfo>>;
}

/// SnapshotProvider backed by the cluster's VolumeSnapshot objects
pub struct KubeSnapshotProvider {
    client: Client,
}

impl KubeSnapshotProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<VolumeSnapshot> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn to_info(snap: &VolumeSnapshot) -> Result<SnapshotInfo> {
    let name = snap.name_any();
    let namespace = snap.namespace().unwrap_or_default();
    let pvc_name = snap
        .spec
        .source
        .persistent_volume_claim_name
        .clone()
        .ok_or_else(|| {
            Error::validation(format!("snapshot {}/{} has no claim source", namespace, name))
        })?;
    let snapshot_data = snap
        .status
        .as_ref()
        .and_then(|s| s.bound_volume_snapshot_content_name.clone())
        .or_else(|| snap.spec.source.volume_snapshot_content_name.clone())
        .unwrap_or_default();

    Ok(SnapshotInfo {
        name,
        namespace,
        pvc_name,
        snapshot_data,
    })
}

fn is_ready(snap: &VolumeSnapshot) -> bool {
    snap.status
        .as_ref()
        .and_then(|s| s.ready_to_use)
        .unwrap_or(false)
}

#[async_trait]
impl SnapshotProvider for KubeSnapshotProvider {
    async fn get_snapshot(&self, name: &str, namespace: &str) -> Result<SnapshotInfo> {
        let snap = self.api(namespace).get(name).await.map_err(|e| match e {
            kube::Error::Api(ae) if ae.code == 404 => {
                Error::SnapshotNotFound(format!("{}/{}", namespace, name))
            }
            other => other.into(),
        })?;
        to_info(&snap)
    }

    async fn validate_snapshot(
        &self,
        name: &str,
        namespace: &str,
        retry: Duration,
        timeout: Duration,
    ) -> Result<()> {
        let api = self.api(namespace);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snap = api.get(name).await?;
            if is_ready(&snap) {
                return Ok(());
            }
            let reason = snap
                .status
                .as_ref()
                .and_then(|s| s.error.as_ref())
                .and_then(|e| e.message.clone())
                .unwrap_or_else(|| "not ready to use".to_string());
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::SnapshotNotReady {
                    snapshot: format!("{}/{}", namespace, name),
                    reason,
                });
            }
            debug!(snapshot = name, namespace, %reason, "Snapshot not ready, retrying");
            tokio::time::sleep(retry).await;
        }
    }

    async fn group_snapshots(&self, group: &str, namespace: &str) -> Result<Vec<SnapshotInfo>> {
        let selector = format!("{}={}", GROUP_SNAPSHOT_LABEL, group);
        let members = self
            .api(namespace)
            .list(&ListParams::default().labels(&selector))
            .await?;
        if members.items.is_empty() {
            return Err(Error::SnapshotNotFound(format!(
                "no snapshots found for group snapshot {}/{}",
                namespace, group
            )));
        }
        members.items.iter().map(to_info).collect()
    }
}
