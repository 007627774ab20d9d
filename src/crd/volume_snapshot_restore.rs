//! VolumeSnapshotRestore Custom Resource Definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// VolumeSnapshotRestore resource specification
///
/// Requests an in-place restore of the claims captured by a snapshot (or a
/// group snapshot) back to the snapshotted data, without provisioning new
/// storage.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "storage.oso.sh",
    version = "v1alpha1",
    kind = "VolumeSnapshotRestore",
    plural = "volumesnapshotrestores",
    singular = "volumesnapshotrestore",
    shortname = "vsr",
    namespaced,
    status = "VolumeSnapshotRestoreStatus",
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.status"}"#,
    printcolumn = r#"{"name": "Source", "type": "string", "jsonPath": ".spec.sourceName"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotRestoreSpec {
    /// Name of the snapshot (or group snapshot) to restore from
    pub source_name: String,

    /// Namespace of the snapshot source
    pub source_namespace: String,

    /// Whether the source is a group snapshot
    #[serde(default)]
    pub group_snapshot: bool,
}

/// VolumeSnapshotRestore status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotRestoreStatus {
    /// Current phase of the restore
    #[serde(default)]
    pub status: RestorePhase,

    /// Per-volume restore bookkeeping; entries are appended once and then
    /// only mutated in place, keyed by (pvc, namespace)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<RestoreVolumeInfo>,
}

/// Phase of a restore, at the request level and per volume
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum RestorePhase {
    #[default]
    Initial,
    Pending,
    InProgress,
    Staged,
    Successful,
    Failed,
    /// Catch-all for a persisted value this build does not recognize; the
    /// state machine reports it as a validation error instead of dropping
    /// the object
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RestorePhase::Initial => "Initial",
            RestorePhase::Pending => "Pending",
            RestorePhase::InProgress => "InProgress",
            RestorePhase::Staged => "Staged",
            RestorePhase::Successful => "Successful",
            RestorePhase::Failed => "Failed",
            RestorePhase::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Restore bookkeeping for a single volume
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreVolumeInfo {
    /// Backend volume ID
    #[serde(default)]
    pub volume: String,

    /// Claim name (identity, immutable once created)
    pub pvc: String,

    /// Claim namespace (identity, immutable once created)
    pub namespace: String,

    /// Snapshot data reference this volume restores from
    #[serde(default)]
    pub snapshot: String,

    /// Driver-reported restore status for this volume
    #[serde(default)]
    pub restore_status: RestorePhase,

    /// Driver-reported reason, populated on failure
    #[serde(default)]
    pub reason: String,
}

impl VolumeSnapshotRestore {
    /// Current request-level phase, `Initial` when status is unset
    pub fn phase(&self) -> RestorePhase {
        self.status.as_ref().map(|s| s.status).unwrap_or_default()
    }

    /// Mutable status, initialized on first access
    pub fn status_mut(&mut self) -> &mut VolumeSnapshotRestoreStatus {
        self.status.get_or_insert_with(Default::default)
    }

    /// Volume records, empty when status is unset
    pub fn volumes(&self) -> &[RestoreVolumeInfo] {
        self.status
            .as_ref()
            .map(|s| s.volumes.as_slice())
            .unwrap_or_default()
    }
}
