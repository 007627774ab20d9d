//! Consumed snapshot resource types
//!
//! The operator reads `VolumeSnapshot` objects owned by the external
//! snapshotter; it never installs or mutates this CRD. Only the fields the
//! restore flow needs are modelled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label the snapshotter places on member snapshots of a group snapshot
pub const GROUP_SNAPSHOT_LABEL: &str = "groupsnapshot.storage.k8s.io/group-snapshot-name";

/// VolumeSnapshot spec subset (snapshot.storage.k8s.io/v1)
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "snapshot.storage.k8s.io",
    version = "v1",
    kind = "VolumeSnapshot",
    plural = "volumesnapshots",
    namespaced,
    status = "VolumeSnapshotStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSpec {
    /// Snapshot source
    pub source: VolumeSnapshotSource,

    /// Snapshot class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_class_name: Option<String>,
}

/// Source of a VolumeSnapshot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSource {
    /// Claim the snapshot was taken from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim_name: Option<String>,

    /// Pre-provisioned snapshot content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_content_name: Option<String>,
}

/// VolumeSnapshot status subset
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotStatus {
    /// Whether the snapshot is usable as a restore source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_to_use: Option<bool>,

    /// Bound snapshot content name (the snapshot data reference)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_volume_snapshot_content_name: Option<String>,

    /// Last snapshotter error message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<VolumeSnapshotError>,
}

/// Snapshotter error detail
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
