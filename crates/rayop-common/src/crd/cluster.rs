//! RayCluster Custom Resource Definition
//!
//! A RayCluster is one head pod plus any number of worker groups, each with
//! its own pod template and replica bounds.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a RayCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "ray.io",
    version = "v1",
    kind = "RayCluster",
    plural = "rayclusters",
    shortname = "rc",
    namespaced,
    status = "RayClusterStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RayClusterSpec {
    /// Ray version deployed by the images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ray_version: Option<String>,

    /// Head group: exactly one head pod
    pub head_group_spec: HeadGroupSpec,

    /// Worker groups, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub worker_group_specs: Vec<WorkerGroupSpec>,

    /// Suspend the cluster (delete all pods)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
}

/// Head group of a RayCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeadGroupSpec {
    /// Arguments passed to `ray start` on the head
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ray_start_params: BTreeMap<String, String>,

    /// Pod template of the head
    pub template: PodTemplateSpec,
}

/// A named group of identical worker pods
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerGroupSpec {
    /// Unique name of the group within the cluster
    pub group_name: String,

    /// Desired number of replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Lower replica bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,

    /// Upper replica bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,

    /// Hosts per replica (multi-host groups such as TPU slices)
    #[serde(default = "default_num_of_hosts")]
    pub num_of_hosts: i32,

    /// Arguments passed to `ray start` on each worker
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ray_start_params: BTreeMap<String, String>,

    /// Pod template shared by every worker of the group
    pub template: PodTemplateSpec,
}

fn default_num_of_hosts() -> i32 {
    1
}

impl Default for WorkerGroupSpec {
    fn default() -> Self {
        Self {
            group_name: String::new(),
            replicas: None,
            min_replicas: None,
            max_replicas: None,
            num_of_hosts: default_num_of_hosts(),
            ray_start_params: BTreeMap::new(),
            template: PodTemplateSpec::default(),
        }
    }
}

impl WorkerGroupSpec {
    /// Desired replica count: `replicas` (defaulting to `minReplicas`),
    /// clamped into `[minReplicas, maxReplicas]` and never negative.
    pub fn desired_replicas(&self) -> i32 {
        let min = self.min_replicas.unwrap_or(0).max(0);
        let max = self.max_replicas.unwrap_or(i32::MAX).max(min);
        self.replicas.unwrap_or(min).clamp(min, max)
    }

    /// Number of pods the group runs when fully scaled to its desired replicas
    pub fn desired_pods(&self) -> i32 {
        self.desired_replicas().saturating_mul(self.num_of_hosts.max(1))
    }
}

/// Status of a RayCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RayClusterStatus {
    /// Coarse cluster state (e.g. "ready", "suspended")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Human-readable reason for the current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Worker pods currently ready
    #[serde(default)]
    pub ready_worker_replicas: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(replicas: Option<i32>, min: Option<i32>, max: Option<i32>) -> WorkerGroupSpec {
        WorkerGroupSpec {
            group_name: "workers".to_string(),
            replicas,
            min_replicas: min,
            max_replicas: max,
            ..Default::default()
        }
    }

    #[test]
    fn desired_replicas_uses_replicas_within_bounds() {
        assert_eq!(worker(Some(3), Some(1), Some(5)).desired_replicas(), 3);
    }

    #[test]
    fn desired_replicas_clamps_to_bounds() {
        assert_eq!(worker(Some(10), Some(1), Some(5)).desired_replicas(), 5);
        assert_eq!(worker(Some(0), Some(2), Some(5)).desired_replicas(), 2);
    }

    #[test]
    fn desired_replicas_defaults_to_min() {
        assert_eq!(worker(None, Some(2), None).desired_replicas(), 2);
        assert_eq!(worker(None, None, None).desired_replicas(), 0);
    }

    #[test]
    fn desired_pods_multiplies_hosts() {
        let mut group = worker(Some(2), None, None);
        group.num_of_hosts = 4;
        assert_eq!(group.desired_pods(), 8);
    }

    #[test]
    fn spec_deserializes_from_camel_case() {
        let json = serde_json::json!({
            "headGroupSpec": {
                "rayStartParams": {"dashboard-host": "0.0.0.0"},
                "template": {"spec": {"containers": [{"name": "ray-head", "image": "rayproject/ray"}]}}
            },
            "workerGroupSpecs": [
                {"groupName": "small", "replicas": 2, "template": {}},
                {"groupName": "large", "minReplicas": 1, "maxReplicas": 3, "numOfHosts": 2, "template": {}}
            ]
        });

        let spec: RayClusterSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.worker_group_specs.len(), 2);
        assert_eq!(spec.worker_group_specs[0].group_name, "small");
        assert_eq!(spec.worker_group_specs[0].num_of_hosts, 1);
        assert_eq!(spec.worker_group_specs[1].desired_pods(), 2);
    }
}
