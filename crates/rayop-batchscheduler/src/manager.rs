//! Batch scheduler selection
//!
//! The operator is configured with at most one batch scheduler. The manager
//! resolves the configured name against the registered factories, builds the
//! scheduler once, and hands the same instance to every reconciler.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::runtime::Controller;
use kube::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use rayop_common::crd::RayCluster;

use crate::error::SchedulerError;
use crate::interface::{BatchScheduler, BatchSchedulerFactory};
use crate::yunikorn::{self, YuniKornSchedulerFactory};

/// Batch scheduler section of the operator configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSchedulerConfig {
    /// Legacy switch: enables the default batch scheduler (YuniKorn)
    #[serde(default)]
    pub enable_batch_scheduler: bool,

    /// Name of the batch scheduler to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_scheduler: Option<String>,
}

impl BatchSchedulerConfig {
    /// Check the two selection fields are not used together
    pub fn validate(&self) -> Result<(), SchedulerError> {
        match (&self.batch_scheduler, self.enable_batch_scheduler) {
            (Some(_), true) => Err(SchedulerError::InvalidConfig(
                "enableBatchScheduler and batchScheduler cannot be set together".to_string(),
            )),
            (Some(name), false) if name.trim().is_empty() => Err(
                SchedulerError::InvalidConfig("batchScheduler must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Scheduler selected by this configuration, if any
    pub fn scheduler_name(&self) -> Option<&str> {
        match (&self.batch_scheduler, self.enable_batch_scheduler) {
            (Some(name), _) => Some(name.as_str()),
            (None, true) => Some(yunikorn::plugin_name()),
            (None, false) => None,
        }
    }
}

/// Factories of every built-in batch scheduler, keyed by name
pub fn default_factories() -> BTreeMap<String, Arc<dyn BatchSchedulerFactory>> {
    let mut factories: BTreeMap<String, Arc<dyn BatchSchedulerFactory>> = BTreeMap::new();
    factories.insert(
        yunikorn::plugin_name().to_string(),
        Arc::new(YuniKornSchedulerFactory),
    );
    factories
}

struct ActiveScheduler {
    factory: Arc<dyn BatchSchedulerFactory>,
    scheduler: Arc<dyn BatchScheduler>,
}

/// Holds the batch scheduler selected by configuration
pub struct SchedulerManager {
    active: Option<ActiveScheduler>,
}

impl SchedulerManager {
    /// Build the manager over the built-in schedulers
    pub fn new(config: &BatchSchedulerConfig, client: Client) -> Result<Self, SchedulerError> {
        Self::with_factories(config, client, default_factories())
    }

    /// Build the manager over an explicit factory registry
    pub fn with_factories(
        config: &BatchSchedulerConfig,
        client: Client,
        factories: BTreeMap<String, Arc<dyn BatchSchedulerFactory>>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        let Some(name) = config.scheduler_name() else {
            info!("batch scheduling disabled");
            return Ok(Self { active: None });
        };

        let factory = factories
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownScheduler(name.to_string()))?;
        let scheduler = factory.new_scheduler(client)?;
        info!(scheduler = scheduler.name(), "batch scheduler enabled");

        Ok(Self {
            active: Some(ActiveScheduler { factory, scheduler }),
        })
    }

    /// The configured scheduler, or `None` when batch scheduling is off
    pub fn scheduler(&self) -> Option<Arc<dyn BatchScheduler>> {
        self.active.as_ref().map(|a| a.scheduler.clone())
    }

    /// Let the configured scheduler add watches to the RayCluster controller
    pub fn configure_reconciler(
        &self,
        controller: Controller<RayCluster>,
    ) -> Controller<RayCluster> {
        match &self.active {
            Some(active) => active.factory.configure_reconciler(controller),
            None => controller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::MockBatchSchedulerFactory;
    use crate::yunikorn::YuniKornScheduler;

    fn test_client() -> Client {
        let config = kube::Config::new("http://127.0.0.1:6443".parse().unwrap());
        Client::try_from(config).unwrap()
    }

    fn named(name: &str) -> BatchSchedulerConfig {
        BatchSchedulerConfig {
            batch_scheduler: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn config_deserializes_from_camel_case() {
        let config: BatchSchedulerConfig =
            serde_json::from_str(r#"{"batchScheduler":"yunikorn"}"#).unwrap();
        assert_eq!(config.scheduler_name(), Some("yunikorn"));
        assert!(!config.enable_batch_scheduler);
    }

    #[test]
    fn legacy_flag_selects_yunikorn() {
        let config = BatchSchedulerConfig {
            enable_batch_scheduler: true,
            batch_scheduler: None,
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler_name(), Some("yunikorn"));
    }

    #[test]
    fn both_selectors_are_rejected() {
        let config = BatchSchedulerConfig {
            enable_batch_scheduler: true,
            batch_scheduler: Some("yunikorn".to_string()),
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(
            named("  ").validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn default_config_disables_batch_scheduling() {
        let config = BatchSchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler_name(), None);
    }

    #[tokio::test]
    async fn disabled_manager_has_no_scheduler() {
        let manager =
            SchedulerManager::new(&BatchSchedulerConfig::default(), test_client()).unwrap();
        assert!(manager.scheduler().is_none());
    }

    #[tokio::test]
    async fn manager_builds_configured_scheduler() {
        let manager = SchedulerManager::new(&named("yunikorn"), test_client()).unwrap();
        let scheduler = manager.scheduler().expect("scheduler configured");
        assert_eq!(scheduler.name(), "yunikorn");
    }

    #[tokio::test]
    async fn unknown_scheduler_is_an_error() {
        let result = SchedulerManager::new(&named("kai-scheduler"), test_client());
        assert!(matches!(
            result,
            Err(SchedulerError::UnknownScheduler(name)) if name == "kai-scheduler"
        ));
    }

    #[tokio::test]
    async fn manager_builds_scheduler_once_from_registered_factory() {
        let mut factory = MockBatchSchedulerFactory::new();
        factory
            .expect_new_scheduler()
            .times(1)
            .returning(|_| Ok(Arc::new(YuniKornScheduler::new())));

        let mut factories = default_factories();
        factories.insert("custom".to_string(), Arc::new(factory));

        let manager =
            SchedulerManager::with_factories(&named("custom"), test_client(), factories).unwrap();
        let first = manager.scheduler().unwrap();
        let second = manager.scheduler().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn factory_errors_propagate() {
        let mut factory = MockBatchSchedulerFactory::new();
        factory.expect_new_scheduler().returning(|_| {
            Err(SchedulerError::Submission {
                resource: "scheduler".to_string(),
                message: "auxiliary CRD missing".to_string(),
            })
        });
        let mut factories: BTreeMap<String, Arc<dyn BatchSchedulerFactory>> = BTreeMap::new();
        factories.insert("custom".to_string(), Arc::new(factory));

        let result = SchedulerManager::with_factories(&named("custom"), test_client(), factories);
        assert!(matches!(result, Err(SchedulerError::Submission { .. })));
    }
}
