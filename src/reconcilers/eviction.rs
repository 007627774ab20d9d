//! Pod eviction coordinator
//!
//! Before the driver may overwrite volume data, every workload bound to an
//! affected claim is removed. All pods are deleted gracefully up front; one
//! task per pod then waits for it to disappear, escalating to a forced
//! delete after a bounded interval. Tasks never short-circuit each other:
//! every failure is collected and merged into a single aggregate error once
//! all tasks have finished.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::adapters::ClusterOps;
use crate::error::{Error, Result};

/// Scheduler that must have placed every pod we evict; pods placed by any
/// other mechanism cannot be guaranteed to reschedule correctly
pub const EXPECTED_SCHEDULER: &str = "oso-scheduler";

/// Bounded wait for a gracefully deleted pod to disappear
const POD_DELETE_TIMEOUT: Duration = Duration::from_secs(120);
/// Shorter wait after a forced delete
const FORCE_DELETE_TIMEOUT: Duration = Duration::from_secs(30);

/// Abort unless every pod was placed by the expected scheduler
pub fn verify_scheduler(pods: &[Pod]) -> Result<()> {
    for pod in pods {
        let scheduler = pod
            .spec
            .as_ref()
            .and_then(|s| s.scheduler_name.clone())
            .unwrap_or_default();
        if scheduler != EXPECTED_SCHEDULER {
            return Err(Error::UnexpectedScheduler {
                pod: pod.name_any(),
                scheduler,
            });
        }
    }
    Ok(())
}

/// Delete the full pod set and block until every pod is gone or has
/// conclusively failed to go
pub async fn ensure_pods_deleted(cluster: Arc<dyn ClusterOps>, pods: Vec<Pod>) -> Result<()> {
    for pod in &pods {
        let namespace = pod.namespace().unwrap_or_default();
        cluster.delete_pod(&pod.name_any(), &namespace, false).await?;
    }

    let failures = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let mut tasks = Vec::with_capacity(pods.len());
    for pod in pods {
        let cluster = Arc::clone(&cluster);
        let failures = Arc::clone(&failures);
        tasks.push(tokio::spawn(async move {
            let name = pod.name_any();
            let namespace = pod.namespace().unwrap_or_default();
            let uid = pod.uid().unwrap_or_default();

            if cluster
                .wait_for_pod_deletion(&uid, &name, &namespace, POD_DELETE_TIMEOUT)
                .await
                .is_ok()
            {
                debug!(pod = %name, namespace, "Pod deleted");
                return;
            }

            warn!(pod = %name, namespace, "Pod not deleted in time, force deleting");
            if let Err(err) = cluster.delete_pod(&name, &namespace, true).await {
                failures
                    .lock()
                    .await
                    .push(format!("{}/{}: {}", namespace, name, err));
                return;
            }
            if let Err(err) = cluster
                .wait_for_pod_deletion(&uid, &name, &namespace, FORCE_DELETE_TIMEOUT)
                .await
            {
                failures
                    .lock()
                    .await
                    .push(format!("{}/{}: {}", namespace, name, err));
            }
        }));
    }
    join_all(tasks).await;

    let failures = failures.lock().await.clone();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::PodEviction { failures })
    }
}
