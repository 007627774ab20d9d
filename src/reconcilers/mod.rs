//! Business logic for the restore CRD
//!
//! The controller layer dispatches into these modules:
//! - `restore`: the per-request state machine
//! - `volumes`: snapshot-to-claim enumeration and record merging
//! - `eviction`: parallel pod removal ahead of a destructive restore
//! - `pvc_guard`: the restore-in-progress claim annotation

pub mod eviction;
pub mod pvc_guard;
pub mod restore;
pub mod volumes;

pub use restore::RestoreReconciler;
