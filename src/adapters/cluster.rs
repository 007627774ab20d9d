//! Cluster object operations consumed by the restore flow
//!
//! Thin seam over the Kubernetes API: claim get/update, pods bound to a
//! claim, pod deletion with a bounded disappearance wait, and the single
//! status writer for the restore object.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    runtime::{conditions, wait::await_condition},
    Api, Client, ResourceExt,
};

use crate::crd::VolumeSnapshotRestore;
use crate::error::{Error, Result};

/// Kubernetes object operations needed by the reconcilers
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn get_pvc(&self, name: &str, namespace: &str) -> Result<PersistentVolumeClaim>;

    async fn update_pvc(&self, pvc: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim>;

    /// Pods whose spec mounts the given claim
    async fn pods_using_pvc(&self, pvc: &str, namespace: &str) -> Result<Vec<Pod>>;

    /// Delete a pod; `force` skips the grace period
    async fn delete_pod(&self, name: &str, namespace: &str, force: bool) -> Result<()>;

    /// Wait until the pod with this uid is gone, bounded by `timeout`
    async fn wait_for_pod_deletion(
        &self,
        uid: &str,
        name: &str,
        namespace: &str,
        timeout: Duration,
    ) -> Result<()>;

    /// Persist the restore object's status (this controller is the only
    /// status writer)
    async fn update_restore_status(&self, restore: &VolumeSnapshotRestore) -> Result<()>;
}

/// ClusterOps backed by the live API server
pub struct KubeClusterOps {
    client: Client,
}

impl KubeClusterOps {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pvc_api(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pod_api(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn pod_uses_pvc(pod: &Pod, claim: &str) -> bool {
    pod.spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .map(|vols| {
            vols.iter().any(|v| {
                v.persistent_volume_claim
                    .as_ref()
                    .is_some_and(|c| c.claim_name == claim)
            })
        })
        .unwrap_or(false)
}

#[async_trait]
impl ClusterOps for KubeClusterOps {
    async fn get_pvc(&self, name: &str, namespace: &str) -> Result<PersistentVolumeClaim> {
        self.pvc_api(namespace).get(name).await.map_err(|e| match e {
            kube::Error::Api(ae) if ae.code == 404 => {
                Error::PvcNotFound(format!("{}/{}", namespace, name))
            }
            other => other.into(),
        })
    }

    async fn update_pvc(&self, pvc: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim> {
        let name = pvc.name_any();
        let namespace = pvc.namespace().unwrap_or_default();
        Ok(self
            .pvc_api(&namespace)
            .replace(&name, &PostParams::default(), pvc)
            .await?)
    }

    async fn pods_using_pvc(&self, pvc: &str, namespace: &str) -> Result<Vec<Pod>> {
        let pods = self.pod_api(namespace).list(&ListParams::default()).await?;
        Ok(pods
            .items
            .into_iter()
            .filter(|p| pod_uses_pvc(p, pvc))
            .collect())
    }

    async fn delete_pod(&self, name: &str, namespace: &str, force: bool) -> Result<()> {
        let params = if force {
            DeleteParams {
                grace_period_seconds: Some(0),
                ..DeleteParams::default()
            }
        } else {
            DeleteParams::default()
        };
        match self.pod_api(namespace).delete(name, &params).await {
            Ok(_) => Ok(()),
            // Already gone, which is the outcome we wanted
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_for_pod_deletion(
        &self,
        uid: &str,
        name: &str,
        namespace: &str,
        timeout: Duration,
    ) -> Result<()> {
        let gone = await_condition(self.pod_api(namespace), name, conditions::is_deleted(uid));
        tokio::time::timeout(timeout, gone)
            .await
            .map_err(|_| Error::PodDeletionTimeout(format!("{}/{}", namespace, name)))??;
        Ok(())
    }

    async fn update_restore_status(&self, restore: &VolumeSnapshotRestore) -> Result<()> {
        let name = restore.name_any();
        let namespace = restore.namespace().unwrap_or_default();
        let api: Api<VolumeSnapshotRestore> = Api::namespaced(self.client.clone(), &namespace);
        api.patch_status(
            &name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": restore.status })),
        )
        .await?;
        Ok(())
    }
}
