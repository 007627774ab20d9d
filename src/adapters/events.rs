//! Event emission for restore objects
//!
//! Events are the operator's user-facing progress channel, next to
//! `status`. Publishing is fire-and-forget: a recorder failure is logged
//! and never fails a reconcile.

use async_trait::async_trait;
use kube::{
    runtime::events::{Event, EventType, Recorder, Reporter},
    Client, Resource,
};
use tracing::warn;

use crate::crd::VolumeSnapshotRestore;

/// Sink for Kubernetes events on a restore object
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(
        &self,
        restore: &VolumeSnapshotRestore,
        type_: EventType,
        reason: &str,
        note: String,
    );
}

/// EventSink backed by the kube event recorder
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter::from("volume-restore-operator");
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(
        &self,
        restore: &VolumeSnapshotRestore,
        type_: EventType,
        reason: &str,
        note: String,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, &restore.object_ref(&())).await {
            warn!(error = %e, reason, "Failed to publish event");
        }
    }
}
