//! swapkit-deploy - Deployment library for the swap protocol.
//!
//! This crate deploys the protocol's contracts in dependency order, records
//! every deployment in a per-network registry so re-runs never construct a
//! component twice, and hands the protocol over to governance through batches
//! of wiring calls separated by confirmation barriers.

mod artifacts;
pub use artifacts::ArtifactStore;

mod builder;
pub use builder::{DEFAULT_ARTIFACTS, DEFAULT_OUTDATA, DeployerBuilder};

mod component;
pub use component::{
    AbiValue, ComponentDescriptor, ComponentName, ConstructorArg, encode_call, encode_params,
    function_signature, resolve_args,
};

mod contracts;
pub use contracts::{ContractDeployer, RedeployPolicy};

mod deployer;
pub use deployer::{CONFIG_FILENAME, Deployer, ENV_PREFIX};

mod error;
pub use error::{DeployError, DeployResult};

mod network;
pub use network::{ConfirmationPolicy, GasPricePolicy, KnownNetwork, NetworkConfig};

pub mod pipeline;
pub use pipeline::{
    Pipeline, PipelineExecutor, PipelineStep, RunOutcome, RunReport, StepKind, StepOutcome,
    StepState, registry_table,
};

pub mod protocol;
pub use protocol::{ProtocolConfig, protocol_pipeline};

mod provider;
pub use provider::{NetworkProvider, PendingTx, Receipt, RpcProvider, TxRequest};

mod registry;
pub use registry::{ArtifactRegistry, DeploymentRecord, NetworkIdentity, REGISTRY_DIR, args_hash};

mod rpc;

mod signer;
pub use signer::{MNEMONIC_ENV, PRIVATE_KEY_ENV, SignerConfig, SignerSecrets, TxSigner};

mod submitter;
pub use submitter::TxSubmitter;

mod wiring;
pub use wiring::{Guard, WiringAction, WiringBatch, WiringStage, WiringSummary};

#[cfg(test)]
mod test_utils;
