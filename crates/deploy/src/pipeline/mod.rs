//! Ordered deployment and wiring steps.
//!
//! A [`Pipeline`] runs its steps strictly in declaration order. Every step
//! names the steps it depends on, explicitly or through the components it
//! references, and validation rejects a pipeline where a step would run before
//! one of its predecessors.

mod executor;
mod report;
mod step;

use std::collections::HashSet;

pub use executor::PipelineExecutor;
pub use report::{RunOutcome, RunReport, StepReport, registry_table};
pub use step::{PipelineStep, StepKind, StepOutcome, StepState};

use crate::error::{DeployError, DeployResult};

/// An ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Check the pipeline before anything is submitted.
    ///
    /// References to components outside the pipeline are allowed; they must
    /// resolve from the registry when the step runs.
    pub fn validate(&self) -> DeployResult<()> {
        let names: HashSet<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
        let mut earlier: HashSet<&str> = HashSet::new();

        for step in &self.steps {
            if earlier.contains(step.name.as_str()) {
                return Err(DeployError::InvalidPipeline(format!(
                    "duplicate step `{}`",
                    step.name
                )));
            }

            for declared in &step.depends_on {
                if !names.contains(declared.as_str()) {
                    return Err(DeployError::InvalidPipeline(format!(
                        "step `{}` depends on unknown step `{declared}`",
                        step.name
                    )));
                }
            }

            for predecessor in step.predecessors() {
                if predecessor == step.name {
                    return Err(DeployError::InvalidPipeline(format!(
                        "step `{}` depends on itself",
                        step.name
                    )));
                }
                if names.contains(predecessor) && !earlier.contains(predecessor) {
                    return Err(DeployError::InvalidPipeline(format!(
                        "step `{}` depends on `{predecessor}`, which runs later",
                        step.name
                    )));
                }
            }

            if let StepKind::Wire(stage) = &step.kind {
                if stage.batches.is_empty() {
                    return Err(DeployError::InvalidPipeline(format!(
                        "wiring stage `{}` has no batches",
                        stage.name
                    )));
                }
                if let Some(batch) = stage.batches.iter().find(|b| b.actions.is_empty()) {
                    return Err(DeployError::InvalidPipeline(format!(
                        "batch `{}` of wiring stage `{}` has no actions",
                        batch.name, stage.name
                    )));
                }
            }

            earlier.insert(&step.name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        component::{ComponentDescriptor, ConstructorArg},
        wiring::{WiringAction, WiringBatch, WiringStage},
    };

    fn deploy(name: &str) -> PipelineStep {
        PipelineStep::deploy(ComponentDescriptor::new(name))
    }

    fn deploy_referencing(name: &str, reference: &str) -> PipelineStep {
        PipelineStep::deploy(
            ComponentDescriptor::new(name).arg(ConstructorArg::reference(reference)),
        )
    }

    #[test]
    fn test_valid_pipeline() {
        let pipeline = Pipeline::new()
            .step(deploy("PoolCreator"))
            .step(deploy_referencing("SwapFactory", "PoolCreator"));
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_reference_to_later_step_is_rejected() {
        let pipeline = Pipeline::new()
            .step(deploy_referencing("SwapFactory", "PoolCreator"))
            .step(deploy("PoolCreator"));
        assert!(matches!(
            pipeline.validate(),
            Err(DeployError::InvalidPipeline(_))
        ));
    }

    #[test]
    fn test_reference_outside_pipeline_is_allowed() {
        let pipeline = Pipeline::new().step(deploy_referencing("SwapFactory", "PoolCreator"));
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_duplicate_step_is_rejected() {
        let pipeline = Pipeline::new()
            .step(deploy("PoolCreator"))
            .step(deploy("PoolCreator"));
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let pipeline = Pipeline::new().step(deploy_referencing("SwapFactory", "SwapFactory"));
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_unknown_declared_predecessor_is_rejected() {
        let pipeline = Pipeline::new().step(deploy("PoolCreator").after("Bootstrap"));
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_empty_wiring_batch_is_rejected() {
        let stage = WiringStage::new("Handoff").batch(WiringBatch::new("empty"));
        let pipeline = Pipeline::new().step(PipelineStep::wire(stage));
        assert!(pipeline.validate().is_err());

        let stage = WiringStage::new("Handoff").batch(
            WiringBatch::new("ownership")
                .action(WiringAction::new("SwapFactory", "renounceOwnership")),
        );
        let pipeline = Pipeline::new().step(PipelineStep::wire(stage));
        assert!(pipeline.validate().is_ok());
    }
}
