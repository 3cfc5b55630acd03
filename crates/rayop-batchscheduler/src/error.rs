//! Error types for batch scheduler integrations

use thiserror::Error;

/// Errors raised while synthesizing gang-scheduling metadata
///
/// None of these abort reconciliation: the propagator logs them and the
/// workload runs without gang guarantees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GangError {
    /// A specification needed to enumerate the task groups is missing or malformed
    #[error("cannot build task groups for {resource}: {message}")]
    Construction {
        /// `namespace/name` of the owning resource (or a spec path)
        resource: String,
        /// What is missing
        message: String,
    },

    /// Two groups resolved to the same task-group name
    #[error("duplicate task group name '{name}'")]
    NameCollision {
        /// The colliding name
        name: String,
    },

    /// A resource quantity cannot be represented in the annotation encoding
    #[error("cannot encode resource {resource}={quantity}: {reason}")]
    Encoding {
        /// Resource name (e.g. `cpu`)
        resource: String,
        /// The offending quantity as written
        quantity: String,
        /// Why it was rejected
        reason: String,
    },
}

impl GangError {
    /// Create a construction error for a resource
    pub fn construction(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by scheduler construction and the plugin contract
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The configured scheduler has no registered factory
    #[error("unknown batch scheduler '{0}'")]
    UnknownScheduler(String),

    /// The batch scheduler configuration is inconsistent
    #[error("invalid batch scheduler configuration: {0}")]
    InvalidConfig(String),

    /// The pre-admission hook failed
    #[error("batch scheduling on submission failed for {resource}: {message}")]
    Submission {
        /// `namespace/name` of the workload
        resource: String,
        /// Description of what failed
        message: String,
    },

    /// Kubernetes API error from a scheduler that manages auxiliary objects
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}
