//! Volume enumeration for a restore request
//!
//! Maps resolved snapshots onto the claims they were taken from and merges
//! the result into the request's volume records. The merge is idempotent
//! across reconciles: a record's (pvc, namespace) identity is created once
//! and never duplicated or overwritten.

use kube::ResourceExt;
use tracing::debug;

use crate::adapters::{ClusterOps, SnapshotInfo};
use crate::crd::{RestorePhase, RestoreVolumeInfo, VolumeSnapshotRestore};
use crate::error::Result;

/// Append a volume record for each snapshot-backed claim not already tracked
pub async fn merge_restore_volumes(
    cluster: &dyn ClusterOps,
    snapshots: &[SnapshotInfo],
    restore: &mut VolumeSnapshotRestore,
) -> Result<()> {
    for snap in snapshots {
        debug!(pvc = %snap.pvc_name, snapshot = %snap.name, "Resolving volume for claim");
        let pvc = cluster.get_pvc(&snap.pvc_name, &snap.namespace).await?;
        let pvc_name = pvc.name_any();
        let pvc_namespace = pvc.namespace().unwrap_or_else(|| snap.namespace.clone());

        let status = restore.status_mut();
        let exists = status
            .volumes
            .iter()
            .any(|v| v.pvc == pvc_name && v.namespace == pvc_namespace);
        if exists {
            continue;
        }

        status.volumes.push(RestoreVolumeInfo {
            volume: pvc
                .spec
                .as_ref()
                .and_then(|s| s.volume_name.clone())
                .unwrap_or_default(),
            pvc: pvc_name,
            namespace: pvc_namespace,
            snapshot: snap.snapshot_data.clone(),
            restore_status: RestorePhase::Initial,
            reason: String::new(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::MockCluster;
    use crate::crd::VolumeSnapshotRestoreSpec;
    use assert_matches::assert_matches;
    use crate::error::Error;

    fn restore() -> VolumeSnapshotRestore {
        VolumeSnapshotRestore::new(
            "restore-1",
            VolumeSnapshotRestoreSpec {
                source_name: "snap1".into(),
                source_namespace: "ns1".into(),
                group_snapshot: false,
            },
        )
    }

    fn info(name: &str, pvc: &str) -> SnapshotInfo {
        SnapshotInfo {
            name: name.into(),
            namespace: "ns1".into(),
            pvc_name: pvc.into(),
            snapshot_data: format!("content-{}", name),
        }
    }

    #[tokio::test]
    async fn claims_resolve_to_volume_records() {
        let cluster = MockCluster::default()
            .with_pvc("pvc-a", "ns1", "vol-a")
            .with_pvc("pvc-b", "ns1", "vol-b");
        let mut restore = restore();

        merge_restore_volumes(&cluster, &[info("s1", "pvc-a"), info("s2", "pvc-b")], &mut restore)
            .await
            .unwrap();

        let volumes = restore.volumes();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].pvc, "pvc-a");
        assert_eq!(volumes[0].volume, "vol-a");
        assert_eq!(volumes[0].snapshot, "content-s1");
        assert_eq!(volumes[0].restore_status, RestorePhase::Initial);
    }

    #[tokio::test]
    async fn repeated_enumeration_never_duplicates_records() {
        let cluster = MockCluster::default()
            .with_pvc("pvc-a", "ns1", "vol-a")
            .with_pvc("pvc-b", "ns1", "vol-b");
        let mut restore = restore();

        merge_restore_volumes(&cluster, &[info("s1", "pvc-a")], &mut restore)
            .await
            .unwrap();
        // a prior partial run already processed pvc-a and moved it along
        restore.status_mut().volumes[0].restore_status = RestorePhase::Successful;

        merge_restore_volumes(&cluster, &[info("s1", "pvc-a"), info("s2", "pvc-b")], &mut restore)
            .await
            .unwrap();

        let volumes = restore.volumes();
        assert_eq!(volumes.len(), 2);
        // existing record untouched, new one appended
        assert_eq!(volumes[0].pvc, "pvc-a");
        assert_eq!(volumes[0].restore_status, RestorePhase::Successful);
        assert_eq!(volumes[1].pvc, "pvc-b");
    }

    #[tokio::test]
    async fn missing_claim_is_a_hard_error() {
        let cluster = MockCluster::default();
        let mut restore = restore();

        let err = merge_restore_volumes(&cluster, &[info("s1", "pvc-a")], &mut restore)
            .await
            .unwrap_err();
        assert_matches!(err, Error::PvcNotFound(_));
        assert!(restore.volumes().is_empty());
    }
}
