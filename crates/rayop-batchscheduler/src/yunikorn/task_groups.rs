//! YuniKorn task groups
//!
//! A task group is YuniKorn's unit of gang membership: one per Ray node
//! group, sized to that group's pod count and per-pod resources. The whole
//! set is encoded into a single annotation shared by every member.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Affinity, PodSpec, PodTemplateSpec, Toleration};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rayop_common::crd::{RayClusterSpec, RayJob};
use rayop_common::{RAY_NODE_HEAD_GROUP_LABEL_VALUE, RAY_NODE_SUBMITTER_GROUP_LABEL_VALUE};

use crate::error::GangError;
use crate::interface::resource_id;
use crate::quantity::{self, QuantityError};

/// One gang member group as YuniKorn reads it from the task-groups annotation
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    /// Group name, unique within the set; pods reference it by annotation
    pub name: String,

    /// Pods that must be admitted together
    pub min_member: i32,

    /// Resources of one member pod
    #[serde(default)]
    pub min_resource: BTreeMap<String, Quantity>,

    /// Node selector of the member pods
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Tolerations of the member pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Affinity of the member pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

impl TaskGroup {
    /// Build a task group of `min_member` pods shaped like `template`
    pub fn from_template(
        name: &str,
        min_member: i32,
        template: &PodTemplateSpec,
    ) -> Result<Self, GangError> {
        let spec = template.spec.as_ref();
        Ok(Self {
            name: name.to_string(),
            min_member,
            min_resource: spec.map(pod_resources).transpose()?.unwrap_or_default(),
            node_selector: spec
                .and_then(|s| s.node_selector.clone())
                .unwrap_or_default(),
            tolerations: spec.and_then(|s| s.tolerations.clone()).unwrap_or_default(),
            affinity: spec.and_then(|s| s.affinity.clone()),
        })
    }
}

/// Resources of one pod: per container, requests with limits filling in any
/// resource that has no request, summed over containers.
fn pod_resources(spec: &PodSpec) -> Result<BTreeMap<String, Quantity>, GangError> {
    let mut total: BTreeMap<String, Quantity> = BTreeMap::new();

    for container in &spec.containers {
        let Some(resources) = container.resources.as_ref() else {
            continue;
        };
        let mut effective = resources.requests.clone().unwrap_or_default();
        for (name, limit) in resources.limits.iter().flatten() {
            effective
                .entry(name.clone())
                .or_insert_with(|| limit.clone());
        }

        for (name, value) in effective {
            let summed = match total.get(&name) {
                Some(existing) => quantity::add(existing, &value)
                    .map_err(|e| encoding_error(&name, &value, e))?,
                None => value,
            };
            total.insert(name, summed);
        }
    }

    Ok(total)
}

fn encoding_error(resource: &str, value: &Quantity, err: QuantityError) -> GangError {
    GangError::Encoding {
        resource: resource.to_string(),
        quantity: value.0.clone(),
        reason: err.to_string(),
    }
}

/// Ordered, name-unique set of task groups
///
/// Order is head, workers in declaration order, then the submitter. The
/// encoded form depends on it, so the same spec always yields the same bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskGroups {
    groups: Vec<TaskGroup>,
}

impl TaskGroups {
    /// Task groups of a standalone RayCluster: head, then each worker group
    ///
    /// Worker groups with no desired pods contribute no task group.
    pub fn from_cluster(spec: &RayClusterSpec) -> Result<Self, GangError> {
        let mut groups = Self::default();
        groups.push(TaskGroup::from_template(
            RAY_NODE_HEAD_GROUP_LABEL_VALUE,
            1,
            &spec.head_group_spec.template,
        )?)?;

        for (index, worker) in spec.worker_group_specs.iter().enumerate() {
            if worker.group_name.is_empty() {
                return Err(GangError::construction(
                    format!("workerGroupSpecs[{index}]"),
                    "groupName is empty",
                ));
            }
            let members = worker.desired_pods();
            if members < 1 {
                debug!(group = %worker.group_name, "worker group has no desired pods, no task group");
                continue;
            }
            groups.push(TaskGroup::from_template(
                &worker.group_name,
                members,
                &worker.template,
            )?)?;
        }

        Ok(groups)
    }

    /// Task groups of a RayJob: its cluster's groups plus the submitter
    ///
    /// Fails when the job carries no cluster spec (e.g. it selects an
    /// existing cluster), since there is nothing to enumerate.
    pub fn from_job(job: &RayJob, submitter_template: &PodTemplateSpec) -> Result<Self, GangError> {
        let spec = job.spec.ray_cluster_spec.as_ref().ok_or_else(|| {
            GangError::construction(resource_id(&job.metadata), "rayClusterSpec is not set")
        })?;

        let mut groups = Self::from_cluster(spec)?;
        groups.push(TaskGroup::from_template(
            RAY_NODE_SUBMITTER_GROUP_LABEL_VALUE,
            1,
            submitter_template,
        )?)?;
        Ok(groups)
    }

    /// Parse an encoded task-groups annotation
    pub fn from_annotation(value: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            groups: serde_json::from_str(value)?,
        })
    }

    /// Append a group, rejecting duplicate names
    pub fn push(&mut self, group: TaskGroup) -> Result<(), GangError> {
        if self.groups.iter().any(|g| g.name == group.name) {
            return Err(GangError::NameCollision { name: group.name });
        }
        self.groups.push(group);
        Ok(())
    }

    /// Number of task groups
    pub fn size(&self) -> usize {
        self.groups.len()
    }

    /// Task groups in order
    pub fn iter(&self) -> impl Iterator<Item = &TaskGroup> {
        self.groups.iter()
    }

    /// Look up a group by name
    pub fn get(&self, name: &str) -> Option<&TaskGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Encode as the task-groups annotation value
    ///
    /// JSON array in group order with key-sorted resource maps and canonical
    /// quantities, so equal inputs produce byte-identical output.
    pub fn marshal(&self) -> Result<String, GangError> {
        let canonical = self
            .groups
            .iter()
            .map(|group| {
                let min_resource = group
                    .min_resource
                    .iter()
                    .map(|(name, value)| {
                        quantity::canonicalize(value)
                            .map(|q| (name.clone(), q))
                            .map_err(|e| encoding_error(name, value, e))
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                Ok(TaskGroup {
                    min_resource,
                    ..group.clone()
                })
            })
            .collect::<Result<Vec<_>, GangError>>()?;

        serde_json::to_string(&canonical).map_err(|e| GangError::Encoding {
            resource: "taskGroups".to_string(),
            quantity: String::new(),
            reason: e.to_string(),
        })
    }
}
