//! Prometheus metrics for the Volume Restore Operator

mod prometheus;

pub use prometheus::*;
