//! OSO Volume Restore Kubernetes Operator
//!
//! This operator performs in-place restoration of PersistentVolumeClaims
//! from previously taken volume snapshots, driven by a
//! VolumeSnapshotRestore Custom Resource Definition (CRD). The data-plane
//! restore itself is delegated to a pluggable driver.

pub mod adapters;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
