use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use swapkit_deploy::{DEFAULT_ARTIFACTS, DEFAULT_OUTDATA, KnownNetwork};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "swapkit")]
#[command(author, version, about = "Deploy and wire the swap protocol contracts", long_about = None)]
pub struct Cli {
    /// Verbosity level.
    #[arg(
        short,
        long,
        env = "SWAPKIT_VERBOSITY",
        default_value_t = LevelFilter::INFO,
        global = true
    )]
    pub verbosity: LevelFilter,

    /// Path to a configuration file (or the directory holding `Swapkit.toml`)
    /// saved by an earlier run. Overrides every network and path option.
    #[arg(long, env = "SWAPKIT_CONFIG", global = true)]
    pub config: Option<String>,

    /// Target network.
    #[arg(
        short,
        long,
        env = "SWAPKIT_NETWORK",
        default_value_t = KnownNetwork::Localhost,
        global = true
    )]
    pub network: KnownNetwork,

    /// Override the network's RPC endpoint.
    #[arg(long, env = "SWAPKIT_RPC_URL", global = true)]
    pub rpc_url: Option<Url>,

    /// Chain id the node must report.
    #[arg(long, env = "SWAPKIT_CHAIN_ID", global = true)]
    pub chain_id: Option<u64>,

    /// Confirmations to wait for after each transaction.
    #[arg(long, env = "SWAPKIT_CONFIRMATIONS", global = true)]
    pub confirmations: Option<u64>,

    /// Maximum time to wait for confirmations, in seconds.
    #[arg(long, env = "SWAPKIT_CONFIRMATION_TIMEOUT", global = true)]
    pub confirmation_timeout: Option<u64>,

    /// Account index derived from `MNEMONIC`.
    #[arg(long, env = "SWAPKIT_MNEMONIC_INDEX", default_value_t = 0, global = true)]
    pub mnemonic_index: u32,

    /// Directory holding the configuration and the deployment registry.
    #[arg(long, env = "SWAPKIT_OUTDATA", default_value = DEFAULT_OUTDATA, global = true)]
    pub outdata: String,

    /// Directory holding the compiled contract artifacts.
    #[arg(long, env = "SWAPKIT_ARTIFACTS", default_value = DEFAULT_ARTIFACTS, global = true)]
    pub artifacts: String,

    /// Token the referral fees are paid in.
    #[arg(long, env = "TOKEN_ADDRESS", global = true)]
    pub token: Option<Address>,

    /// Final owner of the protocol. Defaults to the deployer account.
    #[arg(long, env = "GOVERNANCE_ADDRESS", global = true)]
    pub governance: Option<Address>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy the missing components and hand the protocol over to governance.
    Deploy {
        /// Construct every component again, ignoring the registry.
        #[arg(long, env = "SWAPKIT_REDEPLOY")]
        redeploy: bool,

        /// Construct these components again (comma separated).
        #[arg(
            long,
            env = "SWAPKIT_REDEPLOY_COMPONENT",
            value_delimiter = ',',
            conflicts_with = "redeploy"
        )]
        redeploy_component: Vec<String>,
    },
    /// Print the components recorded for the network.
    Status,
    /// Print the address transactions are sent from.
    Accounts,
}
