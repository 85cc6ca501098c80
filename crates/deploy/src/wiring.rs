//! Post-deployment wiring: batches of state-mutating calls separated by
//! confirmation barriers.

use alloy_core::primitives::{Address, Bytes};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{
    component::{ComponentName, ConstructorArg, encode_call, encode_params, references, resolve_args},
    error::{DeployError, DeployResult},
    provider::NetworkProvider,
    registry::ArtifactRegistry,
    submitter::TxSubmitter,
};

/// A read-only getter consulted before an action.
///
/// When the getter already returns `expected`, the action is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    /// Name of a getter without arguments, e.g. `owner`.
    pub getter: String,
    pub expected: ConstructorArg,
}

impl Guard {
    pub fn new(getter: impl Into<String>, expected: ConstructorArg) -> Self {
        Self {
            getter: getter.into(),
            expected,
        }
    }
}

/// A single state-mutating call on a deployed component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringAction {
    pub target: ComponentName,
    pub operation: String,
    pub args: Vec<ConstructorArg>,
    pub guard: Option<Guard>,
}

impl WiringAction {
    pub fn new(target: impl Into<ComponentName>, operation: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            operation: operation.into(),
            args: Vec::new(),
            guard: None,
        }
    }

    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn guarded_by(mut self, getter: impl Into<String>, expected: ConstructorArg) -> Self {
        self.guard = Some(Guard::new(getter, expected));
        self
    }

    /// `Target.operation`, used in logs and error reports.
    pub fn label(&self) -> String {
        format!("{}.{}", self.target, self.operation)
    }

    /// Every component the action needs an address for.
    pub fn references(&self) -> impl Iterator<Item = &ComponentName> {
        std::iter::once(&self.target)
            .chain(references(&self.args))
            .chain(self.guard.iter().flat_map(|g| references(std::slice::from_ref(&g.expected))))
    }

    fn resolve(&self, registry: &ArtifactRegistry) -> DeployResult<ResolvedAction> {
        let label = self.label();
        let target = registry
            .get(&self.target)
            .map(|record| record.address)
            .ok_or_else(|| DeployError::UnresolvedDependency {
                component: label.clone(),
                dependency: self.target.to_string(),
            })?;

        let args = resolve_args(&label, &self.args, registry)?;
        let guard = match &self.guard {
            Some(guard) => {
                let expected = resolve_args(&label, std::slice::from_ref(&guard.expected), registry)?;
                Some(ResolvedGuard {
                    calldata: encode_call(&guard.getter, &[]),
                    expected: encode_params(&expected).into(),
                })
            }
            None => None,
        };

        Ok(ResolvedAction {
            calldata: encode_call(&self.operation, &args),
            label,
            target,
            guard,
        })
    }
}

/// Independent actions submitted together and followed by a barrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringBatch {
    pub name: String,
    pub actions: Vec<WiringAction>,
}

impl WiringBatch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn action(mut self, action: WiringAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// An ordered list of batches. A batch is submitted only after every action
/// of the previous one confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringStage {
    pub name: String,
    pub batches: Vec<WiringBatch>,
}

/// Actions applied and skipped by a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WiringSummary {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug)]
struct ResolvedGuard {
    calldata: Bytes,
    expected: Bytes,
}

#[derive(Debug)]
struct ResolvedAction {
    label: String,
    target: Address,
    calldata: Bytes,
    guard: Option<ResolvedGuard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionOutcome {
    Applied,
    Skipped,
}

impl ResolvedAction {
    async fn apply<P: NetworkProvider>(&self, submitter: &TxSubmitter<P>) -> DeployResult<ActionOutcome> {
        if let Some(guard) = &self.guard {
            let current = submitter
                .provider()
                .call(self.target, guard.calldata.clone())
                .await?;
            if current == guard.expected {
                tracing::info!(action = %self.label, "Already applied, skipping");
                return Ok(ActionOutcome::Skipped);
            }
        }

        let pending = submitter.submit(Some(self.target), self.calldata.clone()).await?;
        tracing::debug!(action = %self.label, tx_hash = %pending.tx_hash, "Wiring action submitted");

        let receipt = submitter.confirm(&pending).await?;
        if !receipt.status {
            return Err(DeployError::Provider(format!(
                "transaction {} reverted",
                receipt.tx_hash
            )));
        }

        tracing::info!(action = %self.label, tx_hash = %receipt.tx_hash, "Wiring action confirmed");
        Ok(ActionOutcome::Applied)
    }
}

impl WiringStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: Vec::new(),
        }
    }

    pub fn batch(mut self, batch: WiringBatch) -> Self {
        self.batches.push(batch);
        self
    }

    /// Every component the stage needs an address for, in order of first use.
    pub fn references(&self) -> Vec<&ComponentName> {
        let mut seen = Vec::new();
        for name in self.batches.iter().flat_map(|b| &b.actions).flat_map(WiringAction::references) {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// Run the batches in order.
    ///
    /// All actions of a batch are resolved before any is submitted, so an
    /// unresolved reference never leaves a batch half-applied. A batch fails
    /// as a whole with [`DeployError::BatchPartialFailure`] when any of its
    /// actions fails, and no later batch is submitted.
    pub async fn execute<P: NetworkProvider>(
        &self,
        registry: &ArtifactRegistry,
        submitter: &TxSubmitter<P>,
    ) -> DeployResult<WiringSummary> {
        let mut summary = WiringSummary::default();

        for batch in &self.batches {
            let actions = batch
                .actions
                .iter()
                .map(|action| action.resolve(registry))
                .collect::<DeployResult<Vec<_>>>()?;

            tracing::info!(
                stage = %self.name,
                batch = %batch.name,
                actions = actions.len(),
                "Submitting wiring batch"
            );

            let outcomes = join_all(actions.iter().map(|action| action.apply(submitter))).await;

            let mut failed = Vec::new();
            let mut confirmed = Vec::new();
            for (action, outcome) in actions.iter().zip(outcomes) {
                match outcome {
                    Ok(ActionOutcome::Applied) => {
                        summary.applied += 1;
                        confirmed.push(action.label.clone());
                    }
                    Ok(ActionOutcome::Skipped) => {
                        summary.skipped += 1;
                        confirmed.push(format!("{} (already applied)", action.label));
                    }
                    Err(e) => {
                        tracing::error!(action = %action.label, error = %e, "Wiring action failed");
                        failed.push(format!("{}: {e}", action.label));
                    }
                }
            }

            if !failed.is_empty() {
                return Err(DeployError::BatchPartialFailure {
                    batch: batch.name.clone(),
                    failed,
                    confirmed,
                });
            }

            tracing::info!(stage = %self.name, batch = %batch.name, "Wiring batch confirmed");
        }

        Ok(summary)
    }
}
