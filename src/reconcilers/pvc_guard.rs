//! PVC restore-in-progress annotation guard
//!
//! The annotation is the only externally observable coordination signal
//! while a destructive restore is in flight; schedulers that respect it
//! will not place new workloads onto the claim.

use tracing::{info, warn};

use crate::adapters::ClusterOps;
use crate::error::Result;

/// Annotation set on a claim between pod eviction and driver completion
pub const RESTORE_ANNOTATION: &str = "storage.oso.sh/restore-in-progress";

/// Mark a claim as having an in-flight restore. Idempotent.
pub async fn mark_claim(cluster: &dyn ClusterOps, name: &str, namespace: &str) -> Result<()> {
    let mut pvc = cluster.get_pvc(name, namespace).await?;
    let annotations = pvc.metadata.annotations.get_or_insert_with(Default::default);
    if annotations.get(RESTORE_ANNOTATION).map(String::as_str) == Some("true") {
        return Ok(());
    }
    annotations.insert(RESTORE_ANNOTATION.to_string(), "true".to_string());
    info!(pvc = name, namespace, "Marking claim for restore");
    cluster.update_pvc(&pvc).await?;
    Ok(())
}

/// Remove the restore annotation from a claim. A claim that is already
/// unmarked is not an error: external tooling may have cleared it, and the
/// restore itself is done either way.
pub async fn unmark_claim(cluster: &dyn ClusterOps, name: &str, namespace: &str) -> Result<()> {
    let mut pvc = cluster.get_pvc(name, namespace).await?;
    let removed = match pvc.metadata.annotations.as_mut() {
        None => {
            warn!(pvc = name, namespace, "No annotations found on claim");
            return Ok(());
        }
        Some(annotations) => annotations.remove(RESTORE_ANNOTATION).is_some(),
    };
    if !removed {
        warn!(pvc = name, namespace, "Restore annotation not found on claim");
        return Ok(());
    }
    info!(pvc = name, namespace, "Removing restore annotation");
    cluster.update_pvc(&pvc).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::MockCluster;

    #[tokio::test]
    async fn mark_sets_annotation_and_is_idempotent() {
        let cluster = MockCluster::default().with_pvc("pvc-a", "ns1", "vol-a");

        mark_claim(&cluster, "pvc-a", "ns1").await.unwrap();
        let pvc = cluster.pvc("pvc-a", "ns1").unwrap();
        assert_eq!(
            pvc.metadata.annotations.unwrap().get(RESTORE_ANNOTATION),
            Some(&"true".to_string())
        );

        // second mark changes nothing and writes nothing
        mark_claim(&cluster, "pvc-a", "ns1").await.unwrap();
        assert_eq!(cluster.pvc_updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unmark_removes_annotation() {
        let cluster = MockCluster::default().with_pvc("pvc-a", "ns1", "vol-a");
        mark_claim(&cluster, "pvc-a", "ns1").await.unwrap();

        unmark_claim(&cluster, "pvc-a", "ns1").await.unwrap();

        let pvc = cluster.pvc("pvc-a", "ns1").unwrap();
        let annotations = pvc.metadata.annotations.unwrap_or_default();
        assert!(!annotations.contains_key(RESTORE_ANNOTATION));
    }

    #[tokio::test]
    async fn unmark_of_unmarked_claim_succeeds_without_update() {
        let cluster = MockCluster::default().with_pvc("pvc-a", "ns1", "vol-a");

        unmark_claim(&cluster, "pvc-a", "ns1").await.unwrap();

        assert!(cluster.pvc_updates.lock().unwrap().is_empty());
    }
}
