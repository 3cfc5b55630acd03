//! Common types for the Ray operator: CRDs, well-known labels, and telemetry

#![deny(missing_docs)]

pub mod crd;
pub mod telemetry;

/// Label whose presence (any value) opts a RayCluster or RayJob into gang scheduling
pub const RAY_CLUSTER_GANG_SCHEDULING_ENABLED: &str = "ray.io/gang-scheduling-enabled";

/// Group name used for the head node of a RayCluster
pub const RAY_NODE_HEAD_GROUP_LABEL_VALUE: &str = "headgroup";

/// Group name used for the submitter pod of a RayJob
pub const RAY_NODE_SUBMITTER_GROUP_LABEL_VALUE: &str = "submitter";

/// Path of the Ray Serve proxy actor health endpoint (relative to the proxy root)
pub const RAY_SERVE_PROXY_HEALTH_PATH: &str = "-/healthz";

/// Default port the Ray Serve proxy listens on
pub const DEFAULT_SERVING_PORT: u16 = 8000;
