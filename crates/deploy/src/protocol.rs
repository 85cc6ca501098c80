//! The swap protocol's deployment pipeline.

use alloy_core::primitives::Address;

use crate::{
    component::{ComponentDescriptor, ConstructorArg},
    pipeline::{Pipeline, PipelineStep},
    wiring::{WiringAction, WiringBatch, WiringStage},
};

pub const POOL_CREATOR: &str = "PoolCreator";
pub const SWAP_FACTORY: &str = "SwapFactory";
pub const REFERRAL_FEE_RECEIVER: &str = "ReferralFeeReceiver";
pub const GOVERNANCE_HANDOFF: &str = "GovernanceHandoff";

/// Addresses the protocol pipeline is parameterized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// The signer deploying the contracts.
    pub deployer: Address,
    /// Final owner and governance wallet of the protocol.
    pub governance: Address,
    /// Token the referral fees are paid in.
    pub token: Address,
}

/// PoolCreator, SwapFactory and ReferralFeeReceiver, followed by the
/// governance handoff.
///
/// The handoff configures the factory and hands the fee receiver to
/// governance in one batch. The factory's own ownership is transferred last,
/// alone, because the configuration calls require the deployer to still own
/// it.
pub fn protocol_pipeline(config: &ProtocolConfig) -> Pipeline {
    let deployer = ConstructorArg::address(config.deployer);
    let governance = ConstructorArg::address(config.governance);

    let handoff = WiringStage::new(GOVERNANCE_HANDOFF)
        .batch(
            WiringBatch::new("configure")
                .action(
                    WiringAction::new(SWAP_FACTORY, "setGovernanceWallet")
                        .arg(governance.clone())
                        .guarded_by("governanceWallet", governance.clone()),
                )
                .action(
                    WiringAction::new(SWAP_FACTORY, "setFeeCollector")
                        .arg(ConstructorArg::reference(REFERRAL_FEE_RECEIVER))
                        .guarded_by("feeCollector", ConstructorArg::reference(REFERRAL_FEE_RECEIVER)),
                )
                .action(
                    WiringAction::new(REFERRAL_FEE_RECEIVER, "transferOwnership")
                        .arg(governance.clone())
                        .guarded_by("owner", governance.clone()),
                ),
        )
        .batch(
            WiringBatch::new("factory-ownership").action(
                WiringAction::new(SWAP_FACTORY, "transferOwnership")
                    .arg(governance.clone())
                    .guarded_by("owner", governance),
            ),
        );

    Pipeline::new()
        .step(PipelineStep::deploy(ComponentDescriptor::new(POOL_CREATOR)))
        .step(PipelineStep::deploy(
            ComponentDescriptor::new(SWAP_FACTORY)
                .arg(deployer.clone())
                .arg(ConstructorArg::reference(POOL_CREATOR))
                .arg(deployer),
        ))
        .step(PipelineStep::deploy(
            ComponentDescriptor::new(REFERRAL_FEE_RECEIVER)
                .arg(ConstructorArg::address(config.token))
                .arg(ConstructorArg::reference(SWAP_FACTORY)),
        ))
        .step(PipelineStep::wire(handoff))
}
