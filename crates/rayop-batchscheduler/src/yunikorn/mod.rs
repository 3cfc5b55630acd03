//! YuniKorn batch scheduler plugin
//!
//! YuniKorn needs no upfront objects. Everything it needs travels on the
//! pods: application id and queue labels, `schedulerName`, and when gang
//! scheduling is on, the encoded task groups plus each pod's own task-group
//! name.
//!
//! The encoded task groups are computed once per RayCluster and stored on its
//! annotations; later pods reuse that value so every member of the gang sees
//! the same bytes across retried reconciles.

mod metadata;
mod task_groups;

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodTemplateSpec};
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument};

use rayop_common::crd::{RayCluster, RayJob};
use rayop_common::{RAY_CLUSTER_GANG_SCHEDULING_ENABLED, RAY_NODE_SUBMITTER_GROUP_LABEL_VALUE};

use crate::error::{GangError, SchedulerError};
use crate::interface::{resource_id, BatchScheduler, BatchSchedulerFactory, Workload};

pub use metadata::{copy_if_present, has_label};
pub use task_groups::{TaskGroup, TaskGroups};

/// Name YuniKorn registers under; also the `spec.schedulerName` of pods
pub const SCHEDULER_NAME: &str = "yunikorn";

/// Label and annotation keys exchanged with YuniKorn
#[derive(Clone, Copy, Debug)]
pub struct YuniKornKeys {
    /// Application id label on Ray resources
    pub ray_application_id_label: &'static str,
    /// Queue label on Ray resources
    pub ray_application_queue_label: &'static str,
    /// Application id label on pods (legacy key read by every YuniKorn release)
    pub pod_application_id_label: &'static str,
    /// Queue label on pods (legacy key)
    pub pod_queue_label: &'static str,
    /// Annotation naming the task group a pod belongs to
    pub task_group_name_annotation: &'static str,
    /// Annotation holding the encoded task groups of the gang
    pub task_groups_annotation: &'static str,
}

/// The keys YuniKorn understands
pub const KEYS: YuniKornKeys = YuniKornKeys {
    ray_application_id_label: "yunikorn.apache.org/app-id",
    ray_application_queue_label: "yunikorn.apache.org/queue",
    pod_application_id_label: "applicationId",
    pod_queue_label: "queue",
    task_group_name_annotation: "yunikorn.apache.org/task-group-name",
    task_groups_annotation: "yunikorn.apache.org/task-groups",
};

/// Whether gang scheduling was requested for a workload
///
/// Only RayClusters and RayJobs can request it, by carrying the
/// gang-scheduling label. The label's value is ignored.
pub fn is_gang_scheduling_enabled(workload: Workload<'_>) -> bool {
    match workload {
        Workload::Cluster(cluster) => {
            has_label(&cluster.metadata, RAY_CLUSTER_GANG_SCHEDULING_ENABLED)
        }
        Workload::Job(job) => has_label(&job.metadata, RAY_CLUSTER_GANG_SCHEDULING_ENABLED),
        Workload::Service(_) => false,
    }
}

/// Name of the plugin, as registered with the scheduler manager
pub fn plugin_name() -> &'static str {
    SCHEDULER_NAME
}

/// YuniKorn scheduler plugin
#[derive(Clone, Copy, Debug, Default)]
pub struct YuniKornScheduler;

impl YuniKornScheduler {
    /// Create the plugin
    pub fn new() -> Self {
        Self
    }

    /// Encoded task groups for pods of `cluster`
    ///
    /// Reuses the value already stored on the cluster; otherwise builds it and
    /// stores it there so later pods reuse it. `None` when encoding failed.
    fn cluster_task_groups(&self, cluster: &mut RayCluster) -> Option<String> {
        if let Some(existing) = cluster
            .annotations()
            .get(KEYS.task_groups_annotation)
            .filter(|value| !value.is_empty())
        {
            debug!(value = %existing, "using existing task groups annotation from RayCluster");
            return Some(existing.clone());
        }

        let encoded = TaskGroups::from_cluster(&cluster.spec).and_then(encode);
        let value = degrade_on_error(encoded, &resource_id(&cluster.metadata))?;

        cluster
            .annotations_mut()
            .insert(KEYS.task_groups_annotation.to_string(), value.clone());
        Some(value)
    }
}

/// Marshal task groups, logging what was produced
fn encode(groups: TaskGroups) -> Result<String, GangError> {
    let value = groups.marshal()?;
    info!(
        key = KEYS.task_groups_annotation,
        value = %value,
        num_of_task_groups = groups.size(),
        "built task groups annotation"
    );
    Ok(value)
}

/// Turn a gang-metadata failure into "no gang metadata" for the workload
fn degrade_on_error(result: Result<String, GangError>, resource: &str) -> Option<String> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!(
                error = %e,
                resource = %resource,
                "failed to build gang scheduling annotations, gang scheduling will not be enabled for this workload"
            );
            None
        }
    }
}

#[async_trait]
impl BatchScheduler for YuniKornScheduler {
    fn name(&self) -> &'static str {
        SCHEDULER_NAME
    }

    async fn do_batch_scheduling_on_submission(
        &self,
        workload: Workload<'_>,
    ) -> Result<(), SchedulerError> {
        // nothing to create upfront
        debug!(
            kind = workload.kind(),
            resource = %workload.resource_id(),
            "no batch scheduling work on submission"
        );
        Ok(())
    }

    #[instrument(skip_all, fields(scheduler = SCHEDULER_NAME, raycluster = %resource_id(&cluster.metadata), group = %group_name))]
    fn add_metadata_to_pod(&self, cluster: &mut RayCluster, group_name: &str, pod: &mut Pod) {
        copy_if_present(
            &cluster.metadata,
            &mut pod.metadata,
            KEYS.ray_application_id_label,
            KEYS.pod_application_id_label,
        );
        copy_if_present(
            &cluster.metadata,
            &mut pod.metadata,
            KEYS.ray_application_queue_label,
            KEYS.pod_queue_label,
        );
        pod.spec.get_or_insert_with(Default::default).scheduler_name =
            Some(SCHEDULER_NAME.to_string());

        if !is_gang_scheduling_enabled(Workload::Cluster(cluster)) {
            return;
        }

        let Some(task_groups) = self.cluster_task_groups(cluster) else {
            return;
        };
        let annotations = pod.annotations_mut();
        annotations.insert(KEYS.task_groups_annotation.to_string(), task_groups);
        // the per-pod group name differs between head and workers
        annotations.insert(
            KEYS.task_group_name_annotation.to_string(),
            group_name.to_string(),
        );
        info!("gang scheduling enabled for RayCluster pod");
    }

    #[instrument(skip_all, fields(scheduler = SCHEDULER_NAME, rayjob = %resource_id(&job.metadata)))]
    fn add_metadata_to_cluster_from_job(
        &self,
        job: &RayJob,
        cluster: &mut RayCluster,
        submitter_template: &PodTemplateSpec,
    ) {
        copy_if_present(
            &job.metadata,
            &mut cluster.metadata,
            KEYS.ray_application_id_label,
            KEYS.ray_application_id_label,
        );
        copy_if_present(
            &job.metadata,
            &mut cluster.metadata,
            KEYS.ray_application_queue_label,
            KEYS.ray_application_queue_label,
        );

        if !is_gang_scheduling_enabled(Workload::Job(job)) {
            return;
        }

        // The cluster is created together with the job, so the groups are
        // rebuilt from the job spec rather than read back from the cluster.
        let encoded = TaskGroups::from_job(job, submitter_template).and_then(encode);
        let Some(value) = degrade_on_error(encoded, &resource_id(&job.metadata)) else {
            return;
        };
        cluster
            .annotations_mut()
            .insert(KEYS.task_groups_annotation.to_string(), value);
        info!("gang scheduling enabled for RayCluster of RayJob");
    }

    #[instrument(skip_all, fields(scheduler = SCHEDULER_NAME, rayjob = %resource_id(&job.metadata)))]
    fn add_metadata_to_submitter_template(
        &self,
        job: &RayJob,
        submitter_template: &mut PodTemplateSpec,
    ) {
        let meta = submitter_template.metadata.get_or_insert_with(Default::default);
        copy_if_present(
            &job.metadata,
            meta,
            KEYS.ray_application_id_label,
            KEYS.pod_application_id_label,
        );
        copy_if_present(
            &job.metadata,
            meta,
            KEYS.ray_application_queue_label,
            KEYS.pod_queue_label,
        );
        submitter_template
            .spec
            .get_or_insert_with(Default::default)
            .scheduler_name = Some(SCHEDULER_NAME.to_string());

        if !is_gang_scheduling_enabled(Workload::Job(job)) {
            return;
        }

        let encoded = TaskGroups::from_job(job, submitter_template).and_then(encode);
        let Some(value) = degrade_on_error(encoded, &resource_id(&job.metadata)) else {
            return;
        };
        let annotations = submitter_template
            .metadata
            .get_or_insert_with(Default::default)
            .annotations
            .get_or_insert_with(Default::default);
        annotations.insert(KEYS.task_groups_annotation.to_string(), value);
        annotations.insert(
            KEYS.task_group_name_annotation.to_string(),
            RAY_NODE_SUBMITTER_GROUP_LABEL_VALUE.to_string(),
        );
        info!("gang scheduling enabled for submitter pod template");
    }
}

/// Factory registering the YuniKorn plugin
#[derive(Clone, Copy, Debug, Default)]
pub struct YuniKornSchedulerFactory;

impl BatchSchedulerFactory for YuniKornSchedulerFactory {
    fn new_scheduler(&self, _client: Client) -> Result<Arc<dyn BatchScheduler>, SchedulerError> {
        Ok(Arc::new(YuniKornScheduler::new()))
    }
}
