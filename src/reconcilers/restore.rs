//! Restore state machine
//!
//! Drives one VolumeSnapshotRestore through
//! Initial -> Pending -> InProgress -> Staged -> Successful/Failed across
//! successive reconciles. Each invocation evaluates exactly one transition
//! and ends with a single persisted status update; the only exception is
//! the Pending -> InProgress flip, which is persisted immediately after the
//! driver start so a crash cannot lose a started restore.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{error, info};

use crate::adapters::{ClusterOps, EventSink, RestoreDriver, SnapshotProvider};
use crate::crd::{RestorePhase, VolumeSnapshotRestore};
use crate::error::{Error, Result};
use crate::reconcilers::{eviction, pvc_guard, volumes};

const VALIDATE_SNAPSHOT_RETRY: Duration = Duration::from_secs(5);
const VALIDATE_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(60);

/// State machine over the boundary adapters
pub struct RestoreReconciler {
    cluster: Arc<dyn ClusterOps>,
    snapshots: Arc<dyn SnapshotProvider>,
    driver: Arc<dyn RestoreDriver>,
    events: Arc<dyn EventSink>,
}

impl RestoreReconciler {
    pub fn new(
        cluster: Arc<dyn ClusterOps>,
        snapshots: Arc<dyn SnapshotProvider>,
        driver: Arc<dyn RestoreDriver>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            cluster,
            snapshots,
            driver,
            events,
        }
    }

    /// Evaluate one transition for the request and persist the outcome.
    /// Handler errors are attached as a warning event and propagated so the
    /// controller schedules a retry.
    pub async fn handle(&self, restore: &mut VolumeSnapshotRestore) -> Result<()> {
        let phase = restore.phase();
        let outcome = match phase {
            RestorePhase::Initial => self.handle_initial(restore).await,
            RestorePhase::Pending | RestorePhase::InProgress => {
                self.handle_restore_progress(restore).await
            }
            RestorePhase::Staged => {
                let outcome = self.handle_staged(restore).await;
                if outcome.is_ok() {
                    self.events
                        .publish(
                            restore,
                            EventType::Normal,
                            &RestorePhase::Successful.to_string(),
                            "Snapshot in-place restore completed".to_string(),
                        )
                        .await;
                }
                outcome
            }
            // Cleanup is idempotent and retried every reconcile until the
            // object is deleted
            RestorePhase::Failed => self.driver.cleanup_restore_objects(restore).await,
            RestorePhase::Successful => return Ok(()),
            RestorePhase::Unknown => Err(Error::validation(format!(
                "invalid status for volume snapshot restore {}: {}",
                restore.name_any(),
                phase
            ))),
        };

        if let Err(err) = &outcome {
            error!(
                restore = %restore.name_any(),
                namespace = %restore.namespace().unwrap_or_default(),
                error = %err,
                "Error handling restore"
            );
            self.events
                .publish(
                    restore,
                    EventType::Warning,
                    &RestorePhase::Failed.to_string(),
                    err.to_string(),
                )
                .await;
        }

        self.cluster.update_restore_status(restore).await?;
        outcome
    }

    /// Driver cleanup on deletion of the request
    pub async fn handle_delete(&self, restore: &VolumeSnapshotRestore) -> Result<()> {
        self.driver.cleanup_restore_objects(restore).await
    }

    /// Initial: enumerate affected volumes, then move to Pending
    async fn handle_initial(&self, restore: &mut VolumeSnapshotRestore) -> Result<()> {
        let source = restore.spec.source_name.clone();
        let namespace = restore.spec.source_namespace.clone();
        info!(snapshot = %source, namespace = %namespace, "Starting in-place restore");

        let snapshots = if restore.spec.group_snapshot {
            self.snapshots.group_snapshots(&source, &namespace).await?
        } else {
            let snap = self.snapshots.get_snapshot(&source, &namespace).await?;
            self.snapshots
                .validate_snapshot(
                    &source,
                    &namespace,
                    VALIDATE_SNAPSHOT_RETRY,
                    VALIDATE_SNAPSHOT_TIMEOUT,
                )
                .await?;
            vec![snap]
        };

        volumes::merge_restore_volumes(self.cluster.as_ref(), &snapshots, restore).await?;
        restore.status_mut().status = RestorePhase::Pending;
        Ok(())
    }

    /// Pending/InProgress: start the driver once, then poll per-volume
    /// progress until every record is terminal
    async fn handle_restore_progress(&self, restore: &mut VolumeSnapshotRestore) -> Result<()> {
        if restore.phase() == RestorePhase::Pending {
            self.driver.start_restore(restore).await?;
            restore.status_mut().status = RestorePhase::InProgress;
            // Persist the started restore before anything else can fail
            self.cluster.update_restore_status(restore).await?;
        }

        if !restore.volumes().is_empty() {
            self.driver.get_restore_status(restore).await?;

            let mut in_progress = false;
            for vol in restore.volumes().to_vec() {
                match vol.restore_status {
                    RestorePhase::InProgress => {
                        info!(pvc = %vol.pvc, "Volume restore in progress");
                        in_progress = true;
                    }
                    RestorePhase::Failed => {
                        self.events
                            .publish(
                                restore,
                                EventType::Warning,
                                &vol.restore_status.to_string(),
                                format!("Error restoring volume {}: {}", vol.pvc, vol.reason),
                            )
                            .await;
                        // Fail fast, but leave the request InProgress: retry
                        // happens through re-reconciliation
                        return Err(Error::driver(format!(
                            "restore failed for volume {}",
                            vol.pvc
                        )));
                    }
                    RestorePhase::Successful => {
                        self.events
                            .publish(
                                restore,
                                EventType::Normal,
                                &vol.restore_status.to_string(),
                                format!("Volume {} restored successfully", vol.pvc),
                            )
                            .await;
                    }
                    _ => {}
                }
            }
            if in_progress {
                return Ok(());
            }
        }

        restore.status_mut().status = RestorePhase::Staged;
        Ok(())
    }

    /// Staged: mark claims, evict bound pods, complete in the driver, then
    /// unmark. Completion failure unmarks best-effort and fails the request.
    async fn handle_staged(&self, restore: &mut VolumeSnapshotRestore) -> Result<()> {
        let volumes = restore.volumes().to_vec();

        for vol in &volumes {
            pvc_guard::mark_claim(self.cluster.as_ref(), &vol.pvc, &vol.namespace).await?;

            let pods = self.cluster.pods_using_pvc(&vol.pvc, &vol.namespace).await?;
            eviction::verify_scheduler(&pods)?;

            info!(pvc = %vol.pvc, namespace = %vol.namespace, "Deleting pods using volume");
            eviction::ensure_pods_deleted(Arc::clone(&self.cluster), pods).await?;
        }

        if let Err(err) = self.driver.complete_restore(restore).await {
            for vol in &volumes {
                if let Err(unmark_err) =
                    pvc_guard::unmark_claim(self.cluster.as_ref(), &vol.pvc, &vol.namespace).await
                {
                    error!(pvc = %vol.pvc, error = %unmark_err, "Unable to unmark claim");
                }
            }
            restore.status_mut().status = RestorePhase::Failed;
            return Err(Error::driver(format!("failed to restore claims: {}", err)));
        }

        for vol in &volumes {
            pvc_guard::unmark_claim(self.cluster.as_ref(), &vol.pvc, &vol.namespace).await?;
        }

        restore.status_mut().status = RestorePhase::Successful;
        Ok(())
    }
}
