//! Error taxonomy for the deployment pipeline.

use std::time::Duration;

use alloy_core::primitives::B256;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type DeployResult<T> = std::result::Result<T, DeployError>;

/// Errors that can halt a pipeline run.
///
/// None of these are retried automatically. Recovery is a re-invocation of the
/// pipeline, which skips every step the registry already records.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A component references another component that has no deployment record.
    #[error("component `{component}` references `{dependency}`, which is not deployed")]
    UnresolvedDependency {
        component: String,
        dependency: String,
    },

    /// The construction transaction was rejected or reverted.
    #[error("deployment of `{component}` failed: {reason}")]
    DeploymentFailed { component: String, reason: String },

    /// The node did not confirm a transaction within the policy window.
    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: B256, waited: Duration },

    /// At least one action of a wiring batch failed.
    #[error(
        "wiring batch `{batch}` failed: {} action(s) failed [{}], {} confirmed [{}]",
        failed.len(),
        failed.join("; "),
        confirmed.len(),
        confirmed.join(", ")
    )]
    BatchPartialFailure {
        batch: String,
        failed: Vec<String>,
        confirmed: Vec<String>,
    },

    /// The pipeline definition itself is malformed.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// The persisted registry belongs to another chain.
    #[error("registry was written for chain {found}, but the network reports chain {expected}")]
    RegistryMismatch { expected: u64, found: u64 },

    /// Reading or writing the registry file failed.
    #[error("registry error: {0}")]
    Registry(String),

    /// Loading a contract artifact failed.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// A network provider call failed outside of a deployment or wiring action.
    #[error("provider error: {0}")]
    Provider(String),

    /// Signer material could not be used.
    #[error("signer error: {0}")]
    Signer(String),
}

impl DeployError {
    /// Attach a component name to a lower-level failure that happened while
    /// constructing it.
    pub fn deployment(component: &str, err: impl std::fmt::Display) -> Self {
        Self::DeploymentFailed {
            component: component.to_string(),
            reason: err.to_string(),
        }
    }
}
