use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    ArtifactRegistry, ArtifactStore, ContractDeployer, NetworkIdentity, PipelineExecutor,
    RedeployPolicy, RunReport, TxSubmitter,
    network::NetworkConfig,
    protocol::{ProtocolConfig, protocol_pipeline},
    provider::{NetworkProvider, RpcProvider},
    signer::{SignerConfig, SignerSecrets, TxSigner},
};

/// The default name for the swapkit configuration file.
pub const CONFIG_FILENAME: &str = "Swapkit.toml";

/// Prefix of environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "SWAPKIT_";

/// Environment variable holding the fee token address.
pub const TOKEN_ADDRESS_ENV: &str = "TOKEN_ADDRESS";

/// Environment variable holding the governance address.
pub const GOVERNANCE_ADDRESS_ENV: &str = "GOVERNANCE_ADDRESS";

/// Environment keys that belong to the CLI and never to the configuration.
const CLI_ENV_KEYS: &[&str] = &[
    "network",
    "rpc_url",
    "chain_id",
    "config",
    "verbosity",
    "redeploy",
    "redeploy_component",
];

/// Everything needed to deploy and wire the protocol on one network.
///
/// The configuration is saved as TOML next to the registry before every run.
/// Signer secrets are never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployer {
    /// Target network.
    pub network: NetworkConfig,
    /// How the deployer identity is obtained.
    pub signer: SignerConfig,
    /// Path to the output data directory (configuration and registry).
    pub outdata: PathBuf,
    /// Path to the compiled contract artifacts.
    pub artifacts: PathBuf,
    /// Token the referral fees are paid in. Required to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    /// Final owner of the protocol. Defaults to the deployer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governance: Option<Address>,

    #[serde(skip)]
    pub secrets: SignerSecrets,
}

impl Deployer {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deployer config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file or a directory containing one.
    ///
    /// `SWAPKIT_`-prefixed environment variables override file values, with
    /// `__` separating nested keys (`SWAPKIT_NETWORK__CONFIRMATIONS=3`).
    /// `TOKEN_ADDRESS` and `GOVERNANCE_ADDRESS` override the saved accounts.
    /// Secrets are read from the environment.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let mut config: Self = Figment::new()
            .merge(Toml::file(&config_path))
            .merge(
                Env::raw()
                    .only(&[TOKEN_ADDRESS_ENV, GOVERNANCE_ADDRESS_ENV])
                    .map(|key| {
                        if key.as_str().eq_ignore_ascii_case(TOKEN_ADDRESS_ENV) {
                            "token".into()
                        } else {
                            "governance".into()
                        }
                    }),
            )
            .merge(Env::prefixed(ENV_PREFIX).ignore(CLI_ENV_KEYS).split("__"))
            .extract()
            .context(format!(
                "Failed to parse config from {}",
                config_path.display()
            ))?;
        config.secrets = SignerSecrets::from_env();

        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Replace the token and governance addresses that are given.
    pub fn with_accounts(mut self, token: Option<Address>, governance: Option<Address>) -> Self {
        if token.is_some() {
            self.token = token;
        }
        if governance.is_some() {
            self.governance = governance;
        }
        self
    }

    /// The fee token, which must be known before anything is deployed.
    pub fn required_token(&self) -> Result<Address> {
        self.token
            .context("TOKEN_ADDRESS is required to deploy the ReferralFeeReceiver")
    }

    /// Save the configuration to the default location (`Swapkit.toml` in outdata).
    pub fn save_config(&self) -> Result<PathBuf> {
        let config_path = self.outdata.join(CONFIG_FILENAME);
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// The address transactions are sent from.
    ///
    /// Only node-unlocked signers need a connection to the network.
    pub async fn signer_address(&self) -> Result<Address> {
        match TxSigner::local(&self.signer, &self.secrets)? {
            Some(signer) => Ok(signer.address()),
            None => {
                let provider = RpcProvider::connect(&self.network, &self.signer, &self.secrets)
                    .await
                    .context("Failed to resolve the unlocked account")?;
                Ok(provider.signer_address())
            }
        }
    }

    /// The registry of the configured network, if anything was deployed yet.
    pub fn status(&self) -> Result<Option<ArtifactRegistry>> {
        ArtifactRegistry::load(&self.outdata, &self.network.name)
            .context("Failed to read deployment registry")
    }

    /// Deploy and wire the protocol.
    ///
    /// Components already recorded in the registry are reused unless
    /// `redeploy` covers them. When `abort` turns `true` the run stops before
    /// the next step.
    pub async fn deploy(
        &self,
        redeploy: RedeployPolicy,
        abort: Option<watch::Receiver<bool>>,
    ) -> Result<RunReport> {
        let token = self.required_token()?;

        tracing::info!(
            network = %self.network.name,
            url = %self.network.rpc_url,
            "Starting deployment process..."
        );

        let provider = RpcProvider::connect(&self.network, &self.signer, &self.secrets)
            .await
            .context("Failed to connect to the network")?;

        let chain_id = provider.chain_id().await?;
        if let Some(expected) = self.network.chain_id {
            anyhow::ensure!(
                expected == chain_id,
                "Network {} expects chain id {expected}, but the node reports {chain_id}",
                self.network.name
            );
        }
        tracing::info!(network = %self.network.name, chain_id, "network id");

        let from = provider.signer_address();
        let governance = self.governance.unwrap_or(from);
        tracing::info!(deployer = %from, %governance, %token, "Deployment accounts");

        let mut registry = ArtifactRegistry::open(
            &self.outdata,
            NetworkIdentity {
                name: self.network.name.clone(),
                chain_id,
            },
        )
        .context("Failed to open deployment registry")?;

        let pipeline = protocol_pipeline(&ProtocolConfig {
            deployer: from,
            governance,
            token,
        });

        let submitter = TxSubmitter::new(provider, from, self.network.confirmation_policy());
        let deployer = ContractDeployer::new(ArtifactStore::from_dir(&self.artifacts), redeploy);
        let mut executor = PipelineExecutor::new(submitter, deployer);
        if let Some(abort) = abort {
            executor = executor.with_abort(abort);
        }

        let report = executor
            .run(&pipeline, &mut registry)
            .await
            .context("Invalid deployment pipeline")?;

        tracing::info!(network = %report.network.name, success = report.is_success(), "Deployment finished");
        Ok(report)
    }
}
