//! In-memory adapter fakes shared by the reconciler unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Pod,
    PodSpec, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;

use crate::adapters::{ClusterOps, EventSink, SnapshotInfo, SnapshotProvider};
use crate::crd::{VolumeSnapshotRestore, VolumeSnapshotRestoreStatus};
use crate::error::{Error, Result};

/// How a fake pod behaves once deletion is requested
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodDeletion {
    /// Disappears within the graceful wait
    Graceful,
    /// Disappears only after a forced delete was issued
    AfterForce,
    /// Never disappears, even after a forced delete
    Never,
}

#[derive(Default)]
pub struct MockCluster {
    pvcs: Mutex<HashMap<String, PersistentVolumeClaim>>,
    pods: Mutex<HashMap<String, Vec<Pod>>>,
    behaviors: Mutex<HashMap<String, PodDeletion>>,
    /// ("namespace/name", force) in issue order
    pub deletes: Mutex<Vec<(String, bool)>>,
    pub pvc_updates: Mutex<Vec<PersistentVolumeClaim>>,
    pub status_updates: Mutex<Vec<Option<VolumeSnapshotRestoreStatus>>>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl MockCluster {
    pub fn with_pvc(self, name: &str, namespace: &str, volume_name: &str) -> Self {
        let pvc = PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(namespace.into()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                volume_name: Some(volume_name.into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.pvcs.lock().unwrap().insert(key(namespace, name), pvc);
        self
    }

    pub fn with_pods(self, pvc: &str, namespace: &str, pods: Vec<Pod>) -> Self {
        self.pods.lock().unwrap().insert(key(namespace, pvc), pods);
        self
    }

    pub fn with_pod_behavior(self, pod: &str, behavior: PodDeletion) -> Self {
        self.behaviors.lock().unwrap().insert(pod.into(), behavior);
        self
    }

    pub fn pvc(&self, name: &str, namespace: &str) -> Option<PersistentVolumeClaim> {
        self.pvcs.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn force_deletes(&self) -> Vec<String> {
        self.deletes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, force)| *force)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Build a fake pod bound to a claim, placed by the given scheduler
pub fn pod(name: &str, namespace: &str, scheduler: &str, pvc: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: Some(PodSpec {
            scheduler_name: Some(scheduler.into()),
            volumes: Some(vec![Volume {
                name: "data".into(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: pvc.into(),
                    read_only: None,
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ClusterOps for MockCluster {
    async fn get_pvc(&self, name: &str, namespace: &str) -> Result<PersistentVolumeClaim> {
        self.pvc(name, namespace)
            .ok_or_else(|| Error::PvcNotFound(key(namespace, name)))
    }

    async fn update_pvc(&self, pvc: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim> {
        let name = pvc.metadata.name.clone().unwrap_or_default();
        let namespace = pvc.metadata.namespace.clone().unwrap_or_default();
        self.pvcs
            .lock()
            .unwrap()
            .insert(key(&namespace, &name), pvc.clone());
        self.pvc_updates.lock().unwrap().push(pvc.clone());
        Ok(pvc.clone())
    }

    async fn pods_using_pvc(&self, pvc: &str, namespace: &str) -> Result<Vec<Pod>> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .get(&key(namespace, pvc))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_pod(&self, name: &str, namespace: &str, force: bool) -> Result<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((key(namespace, name), force));
        Ok(())
    }

    async fn wait_for_pod_deletion(
        &self,
        _uid: &str,
        name: &str,
        namespace: &str,
        _timeout: Duration,
    ) -> Result<()> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(PodDeletion::Graceful);
        let forced = self
            .deletes
            .lock()
            .unwrap()
            .iter()
            .any(|(k, force)| *force && k == &key(namespace, name));
        match behavior {
            PodDeletion::Graceful => Ok(()),
            PodDeletion::AfterForce if forced => Ok(()),
            _ => Err(Error::PodDeletionTimeout(key(namespace, name))),
        }
    }

    async fn update_restore_status(&self, restore: &VolumeSnapshotRestore) -> Result<()> {
        self.status_updates
            .lock()
            .unwrap()
            .push(restore.status.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSnapshots {
    snapshots: HashMap<String, SnapshotInfo>,
    groups: HashMap<String, Vec<SnapshotInfo>>,
    not_ready: bool,
}

impl MockSnapshots {
    pub fn with_snapshot(mut self, info: SnapshotInfo) -> Self {
        self.snapshots
            .insert(key(&info.namespace, &info.name), info);
        self
    }

    pub fn with_group(mut self, group: &str, namespace: &str, members: Vec<SnapshotInfo>) -> Self {
        self.groups.insert(key(namespace, group), members);
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }
}

#[async_trait]
impl SnapshotProvider for MockSnapshots {
    async fn get_snapshot(&self, name: &str, namespace: &str) -> Result<SnapshotInfo> {
        self.snapshots
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(key(namespace, name)))
    }

    async fn validate_snapshot(
        &self,
        name: &str,
        namespace: &str,
        _retry: Duration,
        _timeout: Duration,
    ) -> Result<()> {
        if self.not_ready {
            return Err(Error::SnapshotNotReady {
                snapshot: key(namespace, name),
                reason: "mock snapshot not ready".into(),
            });
        }
        Ok(())
    }

    async fn group_snapshots(&self, group: &str, namespace: &str) -> Result<Vec<SnapshotInfo>> {
        self.groups
            .get(&key(namespace, group))
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(key(namespace, group)))
    }
}

#[derive(Default)]
pub struct MockEvents {
    /// (type, reason, note)
    pub published: Mutex<Vec<(String, String, String)>>,
}

impl MockEvents {
    pub fn warnings(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| t == "Warning")
            .map(|(_, _, note)| note.clone())
            .collect()
    }

    pub fn normals(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| t == "Normal")
            .map(|(_, _, note)| note.clone())
            .collect()
    }
}

#[async_trait]
impl EventSink for MockEvents {
    async fn publish(
        &self,
        _restore: &VolumeSnapshotRestore,
        type_: EventType,
        reason: &str,
        note: String,
    ) {
        let type_ = match type_ {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        };
        self.published
            .lock()
            .unwrap()
            .push((type_.to_string(), reason.to_string(), note));
    }
}
