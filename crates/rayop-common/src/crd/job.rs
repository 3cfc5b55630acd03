//! RayJob Custom Resource Definition
//!
//! A RayJob creates (or selects) a RayCluster and runs an entrypoint against
//! it from a separate submitter pod.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::cluster::RayClusterSpec;

/// Deployment progress of a RayJob
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub enum JobDeploymentStatus {
    /// Nothing created yet
    #[default]
    New,
    /// RayCluster is being created
    Initializing,
    /// Submitter is running the entrypoint
    Running,
    /// Entrypoint finished
    Complete,
    /// Job could not be deployed or run
    Failed,
    /// Job is suspended
    Suspended,
}

impl std::fmt::Display for JobDeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Running => write!(f, "Running"),
            Self::Complete => write!(f, "Complete"),
            Self::Failed => write!(f, "Failed"),
            Self::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Specification for a RayJob
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "ray.io",
    version = "v1",
    kind = "RayJob",
    plural = "rayjobs",
    namespaced,
    status = "RayJobStatus",
    printcolumn = r#"{"name":"Deployment Status","type":"string","jsonPath":".status.jobDeploymentStatus"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RayJobSpec {
    /// Command submitted to the cluster
    #[serde(default)]
    pub entrypoint: String,

    /// Spec of the cluster created for this job. Absent when `clusterSelector`
    /// points at an existing cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ray_cluster_spec: Option<RayClusterSpec>,

    /// Labels selecting an existing RayCluster instead of creating one
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cluster_selector: BTreeMap<String, String>,

    /// Pod template of the submitter; a default one is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_pod_template: Option<PodTemplateSpec>,

    /// Delete the RayCluster once the job finishes
    #[serde(default)]
    pub shutdown_after_job_finishes: bool,

    /// Suspend the job
    #[serde(default)]
    pub suspend: bool,
}

/// Status of a RayJob
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RayJobStatus {
    /// Deployment progress
    #[serde(default)]
    pub job_deployment_status: JobDeploymentStatus,

    /// Name of the RayCluster backing this job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ray_cluster_name: Option<String>,

    /// Human-readable message about the current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
