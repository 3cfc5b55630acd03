//! Custom Resource Definitions for Ray workloads
//!
//! `RayCluster` is the unit of compute; `RayJob` and `RayService` wrap a
//! cluster spec with a submitter or a serve deployment respectively.

mod cluster;
mod job;
mod service;

pub use cluster::{
    HeadGroupSpec, RayCluster, RayClusterSpec, RayClusterStatus, WorkerGroupSpec,
};
pub use job::{JobDeploymentStatus, RayJob, RayJobSpec, RayJobStatus};
pub use service::{RayService, RayServiceSpec, RayServiceStatus};
