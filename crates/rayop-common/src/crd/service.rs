//! RayService Custom Resource Definition
//!
//! A RayService keeps a Ray Serve application running on a RayCluster and
//! probes each pod's serve proxy for readiness.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::cluster::RayClusterSpec;

/// Specification for a RayService
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "ray.io",
    version = "v1",
    kind = "RayService",
    plural = "rayservices",
    namespaced,
    status = "RayServiceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct RayServiceSpec {
    /// Serve application config (YAML, passed through verbatim)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve_config_v2: Option<String>,

    /// Cluster the applications run on
    pub ray_cluster_config: RayClusterSpec,
}

/// Status of a RayService
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RayServiceStatus {
    /// Name of the RayCluster currently serving traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_cluster_name: Option<String>,

    /// Number of pods whose serve proxy reported healthy
    #[serde(default)]
    pub num_serve_endpoints: i32,
}
