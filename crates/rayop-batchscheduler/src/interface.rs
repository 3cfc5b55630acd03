//! Batch scheduler plugin contract
//!
//! The operator talks to every batch scheduler through [`BatchScheduler`] and
//! builds one through its [`BatchSchedulerFactory`]. Schedulers that need no
//! auxiliary objects keep the default no-op hooks.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::Controller;
use kube::Client;

#[cfg(test)]
use mockall::automock;

use rayop_common::crd::{RayCluster, RayJob, RayService};

use crate::error::SchedulerError;

/// A Ray workload handed to a batch scheduler
///
/// Closed set: adding a kind forces every `match` over it to be revisited.
#[derive(Clone, Copy, Debug)]
pub enum Workload<'a> {
    /// A standalone RayCluster
    Cluster(&'a RayCluster),
    /// A RayJob wrapping a cluster spec and a submitter
    Job(&'a RayJob),
    /// A RayService wrapping a cluster spec and serve applications
    Service(&'a RayService),
}

impl<'a> Workload<'a> {
    /// Object metadata of the wrapped resource
    pub fn metadata(&self) -> &'a ObjectMeta {
        match self {
            Self::Cluster(cluster) => &cluster.metadata,
            Self::Job(job) => &job.metadata,
            Self::Service(service) => &service.metadata,
        }
    }

    /// Kubernetes kind of the wrapped resource
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cluster(_) => "RayCluster",
            Self::Job(_) => "RayJob",
            Self::Service(_) => "RayService",
        }
    }

    /// `namespace/name` of the wrapped resource, for logs and errors
    pub fn resource_id(&self) -> String {
        resource_id(self.metadata())
    }
}

/// `namespace/name` (or just `name` for cluster-scoped or unsaved objects)
pub(crate) fn resource_id(meta: &ObjectMeta) -> String {
    let name = meta
        .name
        .as_deref()
        .or(meta.generate_name.as_deref())
        .unwrap_or_default();
    match meta.namespace.as_deref() {
        Some(namespace) => format!("{namespace}/{name}"),
        None => name.to_string(),
    }
}

/// A batch scheduler plugged into the Ray operator
#[async_trait]
pub trait BatchScheduler: Send + Sync {
    /// Registered scheduler name, written into `spec.schedulerName` of pods
    fn name(&self) -> &'static str;

    /// Pre-admission hook run before a workload's pods are created
    ///
    /// Schedulers that need an upfront object (a pod group, a queue binding)
    /// create it here.
    async fn do_batch_scheduling_on_submission(
        &self,
        workload: Workload<'_>,
    ) -> Result<(), SchedulerError>;

    /// Add scheduler metadata to a pod of `cluster` belonging to `group_name`
    ///
    /// May record shared metadata on `cluster` itself; the caller persists it.
    fn add_metadata_to_pod(&self, _cluster: &mut RayCluster, _group_name: &str, _pod: &mut Pod) {}

    /// Add scheduler metadata to the RayCluster created for `job`
    fn add_metadata_to_cluster_from_job(
        &self,
        _job: &RayJob,
        _cluster: &mut RayCluster,
        _submitter_template: &PodTemplateSpec,
    ) {
    }

    /// Add scheduler metadata to the submitter pod template of `job`
    fn add_metadata_to_submitter_template(
        &self,
        _job: &RayJob,
        _submitter_template: &mut PodTemplateSpec,
    ) {
    }
}

/// Builds a [`BatchScheduler`] and extends the RayCluster controller if needed
#[cfg_attr(test, automock)]
pub trait BatchSchedulerFactory: Send + Sync {
    /// Construct a scheduler bound to the operator's API client
    fn new_scheduler(&self, client: Client) -> Result<Arc<dyn BatchScheduler>, SchedulerError>;

    /// Register additional watches on the RayCluster controller
    fn configure_reconciler(&self, controller: Controller<RayCluster>) -> Controller<RayCluster> {
        controller
    }
}
