//! Batch scheduler integration for Ray workloads
//!
//! Lets the operator hand RayCluster, RayJob and submitter pods to an external
//! admission-aware scheduler. The YuniKorn plugin derives gang-scheduling task
//! groups from a workload's head and worker groups, encodes them into a single
//! annotation, and propagates identity labels and annotations onto every
//! member so the scheduler admits the whole gang together.
//!
//! Pure metadata synthesis: nothing here talks to the API server. Callers
//! persist the mutated objects.

#![deny(missing_docs)]

pub mod error;
pub mod interface;
pub mod manager;
pub mod quantity;
pub mod yunikorn;

pub use error::{GangError, SchedulerError};
pub use interface::{BatchScheduler, BatchSchedulerFactory, Workload};
pub use manager::{BatchSchedulerConfig, SchedulerManager};
pub use yunikorn::{is_gang_scheduling_enabled, TaskGroup, TaskGroups, YuniKornScheduler};
