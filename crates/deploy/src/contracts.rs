//! Idempotent component deployment.

use std::collections::BTreeSet;

use alloy_core::primitives::{Address, Bytes};

use crate::{
    artifacts::ArtifactStore,
    component::{ComponentDescriptor, ComponentName, encode_params, resolve_args},
    error::{DeployError, DeployResult},
    provider::NetworkProvider,
    registry::{ArtifactRegistry, DeploymentRecord, args_hash},
    submitter::TxSubmitter,
};

/// Which components are constructed again even though they have a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RedeployPolicy {
    #[default]
    Never,
    All,
    Only(BTreeSet<ComponentName>),
}

impl RedeployPolicy {
    pub fn applies_to(&self, name: &ComponentName) -> bool {
        match self {
            RedeployPolicy::Never => false,
            RedeployPolicy::All => true,
            RedeployPolicy::Only(names) => names.contains(name),
        }
    }
}

/// Deploys components, or returns the address the registry already holds.
#[derive(Debug, Clone)]
pub struct ContractDeployer {
    artifacts: ArtifactStore,
    redeploy: RedeployPolicy,
}

impl ContractDeployer {
    pub fn new(artifacts: ArtifactStore, redeploy: RedeployPolicy) -> Self {
        Self {
            artifacts,
            redeploy,
        }
    }

    /// Return the address of `descriptor`, deploying it first if the registry
    /// has no record of it.
    ///
    /// Every reference in the constructor arguments must already be recorded.
    /// A new deployment is recorded before this returns.
    pub async fn deploy_or_fetch<P: NetworkProvider>(
        &self,
        descriptor: &ComponentDescriptor,
        registry: &mut ArtifactRegistry,
        submitter: &TxSubmitter<P>,
    ) -> DeployResult<Address> {
        let name = &descriptor.name;
        let args = resolve_args(name, &descriptor.constructor_args, registry)?;
        let hash = args_hash(&args)?;

        if let Some(record) = registry.get(name) {
            if !self.redeploy.applies_to(name) {
                if record.args_hash != hash {
                    tracing::warn!(
                        component = %name,
                        address = %record.address,
                        "Constructor arguments changed since the recorded deployment; \
                         keeping the existing contract (use --redeploy-component to replace it)"
                    );
                } else {
                    tracing::info!(component = %name, address = %record.address, "Already deployed");
                }
                return Ok(record.address);
            }

            tracing::info!(component = %name, previous = %record.address, "Redeploying component");
        }

        let mut code = self.artifacts.bytecode(name)?.to_vec();
        code.extend(encode_params(&args));

        tracing::info!(component = %name, args = args.len(), "Deploying component");

        let pending = submitter
            .submit(None, Bytes::from(code))
            .await
            .map_err(|e| DeployError::deployment(name, e))?;
        let receipt = submitter.confirm(&pending).await.map_err(|e| match e {
            DeployError::ConfirmationTimeout { .. } => e,
            e => DeployError::deployment(name, e),
        })?;

        if !receipt.status {
            return Err(DeployError::deployment(
                name,
                format!("construction transaction {} reverted", receipt.tx_hash),
            ));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            DeployError::deployment(
                name,
                format!("receipt of {} has no contract address", receipt.tx_hash),
            )
        })?;

        let network = registry.network().clone();
        registry.put(DeploymentRecord {
            component_name: name.clone(),
            network,
            address,
            constructor_args: args,
            args_hash: hash,
            transaction_hash: receipt.tx_hash,
            deployed_at: chrono::Utc::now().timestamp(),
        })?;

        tracing::info!(
            component = %name,
            %address,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            "Component deployed"
        );

        Ok(address)
    }
}
