//! Restore driver boundary
//!
//! The data-plane mechanics of an in-place restore live behind
//! [`RestoreDriver`]. The operator only sequences start/poll/complete/cleanup
//! against it; backends register implementations by name.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::crd::{RestorePhase, VolumeSnapshotRestore};
use crate::error::{Error, Result};

/// Data-plane operations for an in-place snapshot restore
#[async_trait]
pub trait RestoreDriver: Send + Sync {
    /// Driver name, as selected at startup
    fn name(&self) -> &str;

    /// Begin restoring every volume recorded on the request
    async fn start_restore(&self, restore: &mut VolumeSnapshotRestore) -> Result<()>;

    /// Poll backend progress, updating each volume record's
    /// `restore_status`/`reason` in place
    async fn get_restore_status(&self, restore: &mut VolumeSnapshotRestore) -> Result<()>;

    /// Finish the restore once all volumes are staged and their pods evicted
    async fn complete_restore(&self, restore: &mut VolumeSnapshotRestore) -> Result<()>;

    /// Remove any backend objects created for this restore. Must be
    /// idempotent: it is re-invoked on every reconcile of a Failed request
    /// and again on deletion.
    async fn cleanup_restore_objects(&self, restore: &VolumeSnapshotRestore) -> Result<()>;
}

/// Look up a registered driver by name
pub fn get(name: &str) -> Result<Arc<dyn RestoreDriver>> {
    match name {
        "mock" => Ok(Arc::new(MockDriver::default())),
        other => Err(Error::validation(format!("unknown restore driver: {}", other))),
    }
}

/// In-memory driver for development and tests
///
/// Volumes advance Initial -> InProgress on start, then to Successful after
/// a configurable number of status polls.
#[derive(Default)]
pub struct MockDriver {
    /// Claims that report Failed instead of Successful
    failing: Vec<String>,
    /// Error returned from complete_restore, if set
    complete_error: Option<String>,
    /// Polls before an in-progress volume reports terminal status
    polls_until_done: usize,
    polls: AtomicUsize,
    start_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
}

impl MockDriver {
    pub fn with_failing_volume(mut self, pvc: impl Into<String>) -> Self {
        self.failing.push(pvc.into());
        self
    }

    pub fn with_complete_error(mut self, msg: impl Into<String>) -> Self {
        self.complete_error = Some(msg.into());
        self
    }

    pub fn with_polls_until_done(mut self, polls: usize) -> Self {
        self.polls_until_done = polls;
        self
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RestoreDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_restore(&self, restore: &mut VolumeSnapshotRestore) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        for vol in &mut restore.status_mut().volumes {
            vol.restore_status = RestorePhase::InProgress;
        }
        Ok(())
    }

    async fn get_restore_status(&self, restore: &mut VolumeSnapshotRestore) -> Result<()> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if polls < self.polls_until_done {
            return Ok(());
        }
        for vol in &mut restore.status_mut().volumes {
            if vol.restore_status != RestorePhase::InProgress {
                continue;
            }
            if self.failing.contains(&vol.pvc) {
                vol.restore_status = RestorePhase::Failed;
                vol.reason = "mock driver failure".to_string();
            } else {
                vol.restore_status = RestorePhase::Successful;
            }
        }
        Ok(())
    }

    async fn complete_restore(&self, _restore: &mut VolumeSnapshotRestore) -> Result<()> {
        match &self.complete_error {
            Some(msg) => Err(Error::driver(msg.clone())),
            None => Ok(()),
        }
    }

    async fn cleanup_restore_objects(&self, _restore: &VolumeSnapshotRestore) -> Result<()> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{RestoreVolumeInfo, VolumeSnapshotRestoreSpec};
    use assert_matches::assert_matches;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn restore_with_volume(pvc: &str) -> VolumeSnapshotRestore {
        let mut restore = VolumeSnapshotRestore::new(
            "restore-1",
            VolumeSnapshotRestoreSpec {
                source_name: "snap1".into(),
                source_namespace: "ns1".into(),
                group_snapshot: false,
            },
        );
        restore.metadata = ObjectMeta {
            name: Some("restore-1".into()),
            namespace: Some("ns1".into()),
            ..Default::default()
        };
        restore.status_mut().volumes.push(RestoreVolumeInfo {
            pvc: pvc.into(),
            namespace: "ns1".into(),
            ..Default::default()
        });
        restore
    }

    #[test]
    fn unknown_driver_name_is_rejected() {
        let err = get("portworx").err().expect("lookup must fail");
        assert_matches!(err, Error::Validation(_));
        assert!(get("mock").is_ok());
    }

    #[tokio::test]
    async fn mock_driver_advances_volumes_through_phases() {
        let driver = MockDriver::default();
        let mut restore = restore_with_volume("pvc-a");

        driver.start_restore(&mut restore).await.unwrap();
        assert_eq!(restore.volumes()[0].restore_status, RestorePhase::InProgress);

        driver.get_restore_status(&mut restore).await.unwrap();
        assert_eq!(restore.volumes()[0].restore_status, RestorePhase::Successful);
    }

    #[tokio::test]
    async fn mock_driver_reports_configured_failures() {
        let driver = MockDriver::default().with_failing_volume("pvc-a");
        let mut restore = restore_with_volume("pvc-a");

        driver.start_restore(&mut restore).await.unwrap();
        driver.get_restore_status(&mut restore).await.unwrap();

        assert_eq!(restore.volumes()[0].restore_status, RestorePhase::Failed);
        assert!(!restore.volumes()[0].reason.is_empty());
    }
}
