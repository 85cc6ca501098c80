//! Pipeline steps and their run states.

use alloy_core::primitives::Address;

use crate::{
    component::{ComponentDescriptor, ComponentName},
    wiring::WiringStage,
};

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Deploy a component, or fetch its recorded address.
    Deploy(ComponentDescriptor),
    /// Run a wiring stage against deployed components.
    Wire(WiringStage),
}

/// A named unit of work with the steps it must run after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub name: String,
    pub kind: StepKind,
    /// Steps declared as predecessors in addition to the referenced ones.
    pub depends_on: Vec<String>,
}

impl PipelineStep {
    /// A deployment step named after its component.
    pub fn deploy(descriptor: ComponentDescriptor) -> Self {
        Self {
            name: descriptor.name.to_string(),
            kind: StepKind::Deploy(descriptor),
            depends_on: Vec::new(),
        }
    }

    /// A wiring step named after its stage.
    pub fn wire(stage: WiringStage) -> Self {
        Self {
            name: stage.name.clone(),
            kind: StepKind::Wire(stage),
            depends_on: Vec::new(),
        }
    }

    /// Declare an extra predecessor.
    pub fn after(mut self, step: impl Into<String>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    /// Components whose addresses the step consumes.
    pub fn references(&self) -> Vec<&ComponentName> {
        match &self.kind {
            StepKind::Deploy(descriptor) => descriptor.references().collect(),
            StepKind::Wire(stage) => stage.references(),
        }
    }

    /// Declared predecessors followed by referenced components, deduplicated.
    pub fn predecessors(&self) -> Vec<&str> {
        let mut predecessors: Vec<&str> = Vec::new();
        let referenced = self.references().into_iter().map(ComponentName::as_str);
        for name in self.depends_on.iter().map(String::as_str).chain(referenced) {
            if !predecessors.contains(&name) {
                predecessors.push(name);
            }
        }
        predecessors
    }
}

/// The result of a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Deployed(Address),
    Wired { applied: usize, skipped: usize },
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutcome::Deployed(address) => write!(f, "{address}"),
            StepOutcome::Wired { applied, skipped } => {
                write!(f, "{applied} applied, {skipped} already applied")
            }
        }
    }
}

/// Where a step is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum StepState {
    Pending,
    Running,
    #[strum(to_string = "Succeeded")]
    Succeeded(StepOutcome),
    #[strum(to_string = "Failed")]
    Failed(String),
    /// Never scheduled because the run halted first.
    Skipped,
}

impl StepState {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, StepState::Succeeded(_))
    }
}
