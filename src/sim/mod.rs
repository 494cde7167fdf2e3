//! Simulation front end.
//!
//! The registry and handles applications use to reach devices, and the
//! workload and benchmark drivers built on them.

/// Device sessions.
pub mod handle;

/// Device ownership and lookup.
pub mod registry;

/// Synthetic workloads and benchmarks.
pub mod workload;

pub use handle::DeviceHandle;
pub use registry::DeviceRegistry;
pub use workload::{
    BenchmarkConfig, BenchmarkRunner, Pattern, WorkloadReport, WorkloadRunner, WorkloadSpec,
};
