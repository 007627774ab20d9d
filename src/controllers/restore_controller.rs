//! VolumeSnapshotRestore controller
//!
//! Watches VolumeSnapshotRestore resources and dispatches them into the
//! state machine. The controller owns lifecycle concerns: the cleanup
//! finalizer is in place before any destructive action, deletion runs
//! driver cleanup, and every error maps to a bounded-delay retry.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event as FinalizerEvent},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{error, info, instrument};

use crate::controllers::Context;
use crate::crd::{RestorePhase, VolumeSnapshotRestore};
use crate::error::{Error, Result};
use crate::metrics;

/// Finalizer name for VolumeSnapshotRestore resources
const FINALIZER_NAME: &str = "storage.oso.sh/restore-cleanup";

/// Fixed requeue for non-terminal objects; long-running driver work is
/// polled on this cadence instead of blocking a reconcile
const DEFAULT_REQUEUE: Duration = Duration::from_secs(10);

const KIND: &str = "VolumeSnapshotRestore";

/// Run the VolumeSnapshotRestore controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<VolumeSnapshotRestore> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("VolumeSnapshotRestore CRD not installed: {}", e);
        return;
    }

    info!("Starting VolumeSnapshotRestore controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled VolumeSnapshotRestore"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS.with_label_values(&[KIND]).inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = %obj.namespace().unwrap_or_default()))]
async fn reconcile(obj: Arc<VolumeSnapshotRestore>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[KIND])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[KIND]).inc();

    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<VolumeSnapshotRestore> = Api::namespaced(ctx.client.clone(), &namespace);

    finalizer(&api, FINALIZER_NAME, obj, |event| async {
        match event {
            FinalizerEvent::Apply(restore) => apply(restore, ctx.clone()).await,
            FinalizerEvent::Cleanup(restore) => cleanup(restore, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)))
}

/// Steady-state reconciliation: one state machine transition
async fn apply(obj: Arc<VolumeSnapshotRestore>, ctx: Arc<Context>) -> Result<Action> {
    let phase_before = obj.phase();
    let mut restore = (*obj).clone();

    ctx.reconciler().handle(&mut restore).await?;

    let phase = restore.phase();
    if phase != phase_before {
        let namespace = restore.namespace().unwrap_or_default();
        match phase {
            RestorePhase::Successful => {
                metrics::RESTORES_TOTAL
                    .with_label_values(&["successful", namespace.as_str()])
                    .inc();
            }
            RestorePhase::Failed => {
                metrics::RESTORES_TOTAL
                    .with_label_values(&["failed", namespace.as_str()])
                    .inc();
            }
            _ => {}
        }
    }

    match phase {
        RestorePhase::Successful => Ok(Action::await_change()),
        _ => Ok(Action::requeue(DEFAULT_REQUEUE)),
    }
}

/// Deletion path: driver cleanup, then the finalizer helper removes the
/// finalizer and the API server garbage-collects the object
async fn cleanup(obj: Arc<VolumeSnapshotRestore>, ctx: Arc<Context>) -> Result<Action> {
    info!(name = %obj.name_any(), "Cleaning up VolumeSnapshotRestore");

    ctx.reconciler().handle_delete(&obj).await?;
    metrics::CLEANUPS.with_label_values(&[KIND]).inc();

    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(obj: Arc<VolumeSnapshotRestore>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        name = %obj.name_any(),
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    let requeue_duration = match error {
        Error::Kube(_) | Error::Wait(_) => Duration::from_secs(30),
        // User intervention needed; no point hammering the API server
        Error::Validation(_) | Error::UnexpectedScheduler { .. } => Duration::from_secs(300),
        Error::SnapshotNotFound(_) | Error::SnapshotNotReady { .. } | Error::PvcNotFound(_) => {
            Duration::from_secs(60)
        }
        Error::DriverFailed(_) | Error::PodEviction { .. } => Duration::from_secs(30),
        _ => Duration::from_secs(30),
    };

    Action::requeue(requeue_duration)
}
