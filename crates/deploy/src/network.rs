//! Network selection and confirmation policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Gas price used by BSC networks (20 gwei).
pub const BSC_GAS_PRICE_WEI: u64 = 20_000_000_000;

/// Default local node endpoint.
pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

/// Networks with built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum KnownNetwork {
    Localhost,
    Ganache,
    BscTestnet,
    BscMainnet,
}

impl KnownNetwork {
    /// The name the network's registry file is stored under.
    pub fn registry_name(&self) -> &'static str {
        match self {
            KnownNetwork::Localhost => "localhost",
            KnownNetwork::Ganache => "ganache",
            KnownNetwork::BscTestnet => "bsc_testnet",
            KnownNetwork::BscMainnet => "bsc_mainnet",
        }
    }

    pub fn rpc_url(&self) -> &'static str {
        match self {
            KnownNetwork::Localhost | KnownNetwork::Ganache => LOCAL_RPC_URL,
            KnownNetwork::BscTestnet => "https://data-seed-prebsc-1-s1.binance.org:8545",
            KnownNetwork::BscMainnet => "https://bsc-dataseed.binance.org/",
        }
    }

    /// The expected chain id, if it is fixed for the network.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            KnownNetwork::Localhost | KnownNetwork::Ganache => None,
            KnownNetwork::BscTestnet => Some(97),
            KnownNetwork::BscMainnet => Some(56),
        }
    }

    /// Whether the network is a public chain (as opposed to a local dev node).
    pub fn is_live(&self) -> bool {
        matches!(self, KnownNetwork::BscTestnet | KnownNetwork::BscMainnet)
    }

    pub fn gas_price(&self) -> GasPricePolicy {
        if self.is_live() {
            GasPricePolicy::Fixed {
                wei: BSC_GAS_PRICE_WEI,
            }
        } else {
            GasPricePolicy::Node
        }
    }

    /// Build the default configuration for this network.
    pub fn config(&self) -> anyhow::Result<NetworkConfig> {
        Ok(NetworkConfig {
            name: self.registry_name().to_string(),
            rpc_url: Url::parse(self.rpc_url())?,
            chain_id: self.chain_id(),
            gas_price: self.gas_price(),
            live: self.is_live(),
            ..NetworkConfig::default()
        })
    }
}

/// How the gas price of submitted transactions is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum GasPricePolicy {
    /// Ask the node (`eth_gasPrice`).
    Node,
    /// Always use the given price.
    Fixed { wei: u64 },
}

/// Configuration of the target network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name, also the registry file name.
    pub name: String,
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Expected chain id. When set, a node reporting another chain is rejected.
    pub chain_id: Option<u64>,
    /// Gas price policy.
    pub gas_price: GasPricePolicy,
    /// Number of block confirmations to wait for.
    pub confirmations: u64,
    /// Maximum time to wait for the confirmations of one transaction.
    pub confirmation_timeout_secs: u64,
    /// Interval between receipt polls.
    pub poll_interval_ms: u64,
    /// Whether this is a public chain.
    pub live: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: KnownNetwork::Localhost.registry_name().to_string(),
            rpc_url: Url::parse(LOCAL_RPC_URL).expect("LOCAL_RPC_URL is a valid URL"),
            chain_id: None,
            gas_price: GasPricePolicy::Node,
            confirmations: 1,
            confirmation_timeout_secs: 120,
            poll_interval_ms: 1000,
            live: false,
        }
    }
}

impl NetworkConfig {
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: self.confirmations.max(1),
            timeout: Duration::from_secs(self.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

/// How long and how deep to wait for a transaction to be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks (including the inclusion block) that must be observed.
    pub confirmations: u64,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        NetworkConfig::default().confirmation_policy()
    }
}
