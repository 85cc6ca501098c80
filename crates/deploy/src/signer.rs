//! Signer material and local transaction signing.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, Bytes};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Environment variable holding the deployer mnemonic.
pub const MNEMONIC_ENV: &str = "MNEMONIC";
/// Environment variable holding the deployer private key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Where the deployer identity comes from.
///
/// Only the mode is persisted; secret material is supplied separately through
/// [`SignerSecrets`] and never written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SignerConfig {
    /// Derive the key from a BIP-39 mnemonic at the given account index.
    Mnemonic { index: u32 },
    /// Use a raw hex private key.
    PrivateKey,
    /// Let the node sign with its first unlocked account (local dev nodes).
    Unlocked,
}

/// Secret signer material, read once at startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignerSecrets {
    pub mnemonic: Option<String>,
    pub private_key: Option<String>,
}

impl std::fmt::Debug for SignerSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerSecrets")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SignerSecrets {
    /// Read the secrets from `MNEMONIC` and `PRIVATE_KEY`.
    pub fn from_env() -> Self {
        Self {
            mnemonic: std::env::var(MNEMONIC_ENV).ok().filter(|v| !v.is_empty()),
            private_key: std::env::var(PRIVATE_KEY_ENV).ok().filter(|v| !v.is_empty()),
        }
    }
}

/// The identity transactions are sent from.
#[derive(Debug, Clone)]
pub enum TxSigner {
    /// Transactions are signed locally and sent raw.
    Local(PrivateKeySigner),
    /// Transactions are signed by the node.
    Unlocked(Address),
}

impl TxSigner {
    /// Build a local signer from the configured mode and secrets.
    ///
    /// Returns `None` for [`SignerConfig::Unlocked`], whose address has to be
    /// discovered from the node.
    pub fn local(config: &SignerConfig, secrets: &SignerSecrets) -> DeployResult<Option<Self>> {
        let signer = match config {
            SignerConfig::Mnemonic { index } => {
                let phrase = secrets.mnemonic.as_deref().ok_or_else(|| {
                    DeployError::Signer(format!("{MNEMONIC_ENV} is not set"))
                })?;
                MnemonicBuilder::<English>::default()
                    .phrase(phrase)
                    .index(*index)
                    .map_err(|e| DeployError::Signer(e.to_string()))?
                    .build()
                    .map_err(|e| DeployError::Signer(format!("invalid mnemonic: {e}")))?
            }
            SignerConfig::PrivateKey => {
                let key = secrets.private_key.as_deref().ok_or_else(|| {
                    DeployError::Signer(format!("{PRIVATE_KEY_ENV} is not set"))
                })?;
                key.trim()
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| DeployError::Signer(format!("invalid private key: {e}")))?
            }
            SignerConfig::Unlocked => return Ok(None),
        };

        Ok(Some(TxSigner::Local(signer)))
    }

    pub fn address(&self) -> Address {
        match self {
            TxSigner::Local(signer) => signer.address(),
            TxSigner::Unlocked(address) => *address,
        }
    }
}

/// Sign a legacy (EIP-155) transaction and return its raw encoding.
pub fn sign_legacy(signer: &PrivateKeySigner, mut tx: TxLegacy) -> DeployResult<Bytes> {
    let signature = signer
        .sign_transaction_sync(&mut tx)
        .map_err(|e| DeployError::Signer(format!("failed to sign transaction: {e}")))?;

    let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
    Ok(envelope.encoded_2718().into())
}
