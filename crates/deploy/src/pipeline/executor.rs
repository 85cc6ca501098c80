//! Runs a [`Pipeline`] step by step against the registry.

use tokio::sync::watch;

use super::{
    Pipeline, PipelineStep, StepKind, StepOutcome, StepState,
    report::{RunOutcome, RunReport, StepReport},
};
use crate::{
    contracts::ContractDeployer,
    error::{DeployError, DeployResult},
    provider::NetworkProvider,
    registry::ArtifactRegistry,
    submitter::TxSubmitter,
};

/// Runs a [`Pipeline`] against a registry, one step at a time.
pub struct PipelineExecutor<P> {
    submitter: TxSubmitter<P>,
    deployer: ContractDeployer,
    abort: Option<watch::Receiver<bool>>,
}

impl<P: NetworkProvider> PipelineExecutor<P> {
    pub fn new(submitter: TxSubmitter<P>, deployer: ContractDeployer) -> Self {
        Self {
            submitter,
            deployer,
            abort: None,
        }
    }

    /// Stop scheduling steps once `abort` turns `true`.
    ///
    /// The signal is checked between steps; a step in flight always finishes.
    pub fn with_abort(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn submitter(&self) -> &TxSubmitter<P> {
        &self.submitter
    }

    fn abort_requested(&self) -> bool {
        self.abort.as_ref().is_some_and(|abort| *abort.borrow())
    }

    /// Run every step in order, halting at the first failure.
    ///
    /// Only an invalid pipeline is returned as an error. Step failures and
    /// aborts are reported through [`RunReport::outcome`], together with the
    /// registry contents at the time the run stopped.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        registry: &mut ArtifactRegistry,
    ) -> DeployResult<RunReport> {
        pipeline.validate()?;

        let steps = pipeline.steps();
        let mut states = vec![StepState::Pending; steps.len()];
        let mut outcome = RunOutcome::Succeeded;

        for (index, step) in steps.iter().enumerate() {
            if self.abort_requested() {
                tracing::warn!(next_step = %step.name, "Abort requested, stopping before next step");
                outcome = RunOutcome::Aborted {
                    next_step: step.name.clone(),
                };
                break;
            }

            let ready = step.predecessors().into_iter().all(|predecessor| {
                steps[..index]
                    .iter()
                    .zip(&states)
                    .find(|(earlier, _)| earlier.name == predecessor)
                    .is_none_or(|(_, state)| state.is_succeeded())
            });
            if !ready {
                outcome = RunOutcome::Failed {
                    step: step.name.clone(),
                    error: DeployError::InvalidPipeline(format!(
                        "predecessors of `{}` did not succeed",
                        step.name
                    )),
                };
                break;
            }

            states[index] = StepState::Running;
            tracing::info!(step = %step.name, index = index + 1, total = steps.len(), "Running step");

            match self.run_step(step, registry).await {
                Ok(step_outcome) => {
                    tracing::info!(step = %step.name, outcome = %step_outcome, "Step succeeded");
                    states[index] = StepState::Succeeded(step_outcome);
                }
                Err(error) => {
                    tracing::error!(step = %step.name, %error, "Step failed, halting pipeline");
                    states[index] = StepState::Failed(error.to_string());
                    outcome = RunOutcome::Failed {
                        step: step.name.clone(),
                        error,
                    };
                    break;
                }
            }
        }

        for state in states.iter_mut() {
            if *state == StepState::Pending {
                *state = StepState::Skipped;
            }
        }

        Ok(RunReport {
            network: registry.network().clone(),
            steps: steps
                .iter()
                .zip(states)
                .map(|(step, state)| StepReport {
                    name: step.name.clone(),
                    state,
                })
                .collect(),
            outcome,
            deployments: registry.records().cloned().collect(),
        })
    }

    async fn run_step(
        &self,
        step: &PipelineStep,
        registry: &mut ArtifactRegistry,
    ) -> DeployResult<StepOutcome> {
        match &step.kind {
            StepKind::Deploy(descriptor) => self
                .deployer
                .deploy_or_fetch(descriptor, registry, &self.submitter)
                .await
                .map(StepOutcome::Deployed),
            StepKind::Wire(stage) => {
                let summary = stage.execute(registry, &self.submitter).await?;
                Ok(StepOutcome::Wired {
                    applied: summary.applied,
                    skipped: summary.skipped,
                })
            }
        }
    }
}
