//! Outcome of a pipeline run and its table rendering.

use comfy_table::{Table, presets::UTF8_FULL};

use super::StepState;
use crate::{
    error::DeployError,
    registry::{DeploymentRecord, NetworkIdentity},
};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every step succeeded.
    Succeeded,
    /// `step` failed; no later step was scheduled.
    Failed { step: String, error: DeployError },
    /// An abort was requested before `next_step` was scheduled.
    Aborted { next_step: String },
}

/// The final state of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub state: StepState,
}

/// Summary of a pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub network: NetworkIdentity,
    pub steps: Vec<StepReport>,
    pub outcome: RunOutcome,
    /// Registry contents when the run stopped.
    pub deployments: Vec<DeploymentRecord>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded)
    }

    pub fn state_of(&self, step: &str) -> Option<&StepState> {
        self.steps
            .iter()
            .find(|report| report.name == step)
            .map(|report| &report.state)
    }

    /// Per-step states as a table.
    pub fn steps_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Step", "State", "Result"]);

        for step in &self.steps {
            let result = match &step.state {
                StepState::Succeeded(outcome) => outcome.to_string(),
                StepState::Failed(error) => error.clone(),
                _ => String::new(),
            };
            table.add_row(vec![step.name.clone(), step.state.to_string(), result]);
        }

        table
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Network {} (chain {})",
            self.network.name, self.network.chain_id
        )?;
        writeln!(f, "{}", self.steps_table())?;
        writeln!(f, "{}", registry_table(&self.deployments))?;

        match &self.outcome {
            RunOutcome::Succeeded => write!(f, "Run succeeded"),
            RunOutcome::Failed { step, error } => write!(f, "Run failed at `{step}`: {error}"),
            RunOutcome::Aborted { next_step } => write!(f, "Run aborted before `{next_step}`"),
        }
    }
}

/// Deployment records as a table.
pub fn registry_table<'a>(records: impl IntoIterator<Item = &'a DeploymentRecord>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Component", "Address", "Transaction", "Deployed at"]);

    for record in records {
        let deployed_at = chrono::DateTime::from_timestamp(record.deployed_at, 0)
            .map(|time| time.to_rfc3339())
            .unwrap_or_else(|| record.deployed_at.to_string());
        table.add_row(vec![
            record.component_name.to_string(),
            record.address.to_string(),
            record.transaction_hash.to_string(),
            deployed_at,
        ]);
    }

    table
}
