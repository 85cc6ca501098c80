//! Builder module for creating a [`Deployer`] configuration.
//!
//! This module provides the [`DeployerBuilder`] struct which fills in network
//! defaults, picks the signer mode from the available secrets and creates the
//! output data directory.

use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use url::Url;

use crate::{
    Deployer,
    network::{KnownNetwork, NetworkConfig},
    signer::{SignerConfig, SignerSecrets},
};

/// Default output data directory.
pub const DEFAULT_OUTDATA: &str = "deployments-data";

/// Default compiled artifacts directory (Hardhat layout).
pub const DEFAULT_ARTIFACTS: &str = "artifacts";

/// Builder for creating a [`Deployer`] configuration.
///
/// This builder handles:
/// - Network defaults (URL, chain id, gas price) for known networks
/// - Signer selection: private key, then mnemonic, then the node's unlocked
///   account on local networks
/// - Output data directory creation
///
/// # Example
///
/// ```no_run
/// use swapkit_deploy::{DeployerBuilder, KnownNetwork};
///
/// # fn example() -> anyhow::Result<()> {
/// let deployer = DeployerBuilder::new(KnownNetwork::BscTestnet)?
///     .token("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC".parse()?)
///     .outdata_path("./deployments-data")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeployerBuilder {
    /// The target network.
    network: NetworkConfig,
    /// Explicit signer mode (optional, derived from the secrets if not provided).
    signer: Option<SignerConfig>,
    /// Account index used with a mnemonic.
    mnemonic_index: u32,
    /// Signer secrets.
    secrets: SignerSecrets,
    /// The output data path (optional, defaults to `./deployments-data`).
    outdata: Option<PathBuf>,
    /// The artifacts path (optional, defaults to `./artifacts`).
    artifacts: Option<PathBuf>,
    /// Token the referral fees are paid in (required to deploy).
    token: Option<Address>,
    /// Final owner of the protocol.
    governance: Option<Address>,
}

impl DeployerBuilder {
    /// Create a new [`DeployerBuilder`] with the defaults of a known network.
    pub fn new(network: KnownNetwork) -> Result<Self> {
        Ok(Self::with_network(network.config()?))
    }

    /// Create a new [`DeployerBuilder`] for an arbitrary network.
    pub fn with_network(network: NetworkConfig) -> Self {
        Self {
            network,
            signer: None,
            mnemonic_index: 0,
            secrets: SignerSecrets::default(),
            outdata: None,
            artifacts: None,
            token: None,
            governance: None,
        }
    }

    /// Override the RPC endpoint.
    pub fn rpc_url(mut self, url: Url) -> Self {
        self.network.rpc_url = url;
        self
    }

    /// Require the node to report this chain id.
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.network.chain_id = Some(chain_id);
        self
    }

    /// Set the number of confirmations to wait for.
    pub fn confirmations(mut self, confirmations: u64) -> Self {
        self.network.confirmations = confirmations;
        self
    }

    /// Set the maximum confirmation wait, in seconds.
    pub fn confirmation_timeout_secs(mut self, secs: u64) -> Self {
        self.network.confirmation_timeout_secs = secs;
        self
    }

    /// Force a signer mode.
    pub fn signer(mut self, signer: SignerConfig) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set the account index used with a mnemonic.
    pub fn mnemonic_index(mut self, index: u32) -> Self {
        self.mnemonic_index = index;
        self
    }

    /// Set the signer secrets.
    pub fn secrets(mut self, secrets: SignerSecrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// Set the output data directory.
    pub fn outdata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.outdata = Some(path.into());
        self
    }

    /// Set the compiled artifacts directory.
    pub fn artifacts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts = Some(path.into());
        self
    }

    /// Set the token address.
    pub fn token(mut self, token: Address) -> Self {
        self.token = Some(token);
        self
    }

    /// Set the governance address.
    ///
    /// If not set, the deployer keeps ownership of the protocol.
    pub fn governance(mut self, governance: Address) -> Self {
        self.governance = Some(governance);
        self
    }

    fn resolve_signer(&self) -> Result<SignerConfig> {
        if let Some(signer) = &self.signer {
            return Ok(signer.clone());
        }

        if self.secrets.private_key.is_some() {
            Ok(SignerConfig::PrivateKey)
        } else if self.secrets.mnemonic.is_some() {
            Ok(SignerConfig::Mnemonic {
                index: self.mnemonic_index,
            })
        } else if !self.network.live {
            Ok(SignerConfig::Unlocked)
        } else {
            Err(anyhow::anyhow!(
                "Network {} needs a signer: set PRIVATE_KEY or MNEMONIC",
                self.network.name
            ))
        }
    }

    /// Build the [`Deployer`] configuration.
    ///
    /// This method:
    /// 1. Picks the signer mode if none was forced
    /// 2. Creates the output data directory if it doesn't exist
    pub fn build(self) -> Result<Deployer> {
        let signer = self.resolve_signer()?;

        let outdata_path = self
            .outdata
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTDATA));

        // Create the output data directory if it doesn't exist
        if !outdata_path.try_exists().context(format!(
            "Failed to check if output data directory exists at path {}. Ensure you provided valid permissions to the directory.",
            outdata_path.display()
        ))? {
            std::fs::create_dir_all(&outdata_path)
                .context("Failed to create output data directory")?;
        }

        let outdata_path = outdata_path
            .canonicalize()
            .context("Failed to canonicalize output data directory path")?;

        tracing::info!(
            network = %self.network.name,
            url = %self.network.rpc_url,
            signer = ?signer,
            outdata_path = %outdata_path.display(),
            "Building deployer configuration..."
        );

        Ok(Deployer {
            network: self.network,
            signer,
            outdata: outdata_path,
            artifacts: self
                .artifacts
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS)),
            token: self.token,
            governance: self.governance,
            secrets: self.secrets,
        })
    }
}
