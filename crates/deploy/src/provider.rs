//! Network provider abstraction and its JSON-RPC implementation.

use std::{future::Future, time::Duration};

use alloy_consensus::TxLegacy;
use alloy_core::primitives::{Address, B256, Bytes, TxKind, U64, U128, U256};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{DeployError, DeployResult},
    network::{ConfirmationPolicy, GasPricePolicy, NetworkConfig},
    rpc::{DEFAULT_TIMEOUT, RpcClient},
    signer::{SignerConfig, SignerSecrets, TxSigner, sign_legacy},
};

/// Gas estimates are padded by this percentage.
const GAS_ESTIMATE_MARGIN_PERCENT: u64 = 20;

/// A transaction ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
}

/// A transaction the node has accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: B256,
}

/// The outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    /// `false` when the transaction reverted.
    pub status: bool,
    pub contract_address: Option<Address>,
    pub block_number: u64,
}

/// The capabilities the pipeline needs from a network.
pub trait NetworkProvider: Send + Sync {
    /// The chain id reported by the node.
    fn chain_id(&self) -> impl Future<Output = DeployResult<u64>> + Send;

    /// The next nonce of `address`, including pending transactions.
    fn transaction_count(&self, address: Address)
    -> impl Future<Output = DeployResult<u64>> + Send;

    /// The gas price to submit transactions with.
    fn gas_price(&self) -> impl Future<Output = DeployResult<u128>> + Send;

    /// Estimate the gas limit of a transaction.
    fn estimate_gas(
        &self,
        from: Address,
        to: Option<Address>,
        data: &Bytes,
    ) -> impl Future<Output = DeployResult<u64>> + Send;

    /// Submit a transaction, resolving once the node acknowledges it.
    fn submit(&self, tx: TxRequest) -> impl Future<Output = DeployResult<PendingTx>> + Send;

    /// Wait until `pending` has the policy's number of confirmations.
    ///
    /// Fails with [`DeployError::ConfirmationTimeout`] once the policy window
    /// is exceeded. A reverted transaction is returned as a receipt with a
    /// `false` status.
    fn wait(
        &self,
        pending: &PendingTx,
        policy: &ConfirmationPolicy,
    ) -> impl Future<Output = DeployResult<Receipt>> + Send;

    /// Perform a read-only call.
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = DeployResult<Bytes>> + Send;
}

/// Receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    /// Missing on pre-Byzantium nodes.
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    contract_address: Option<Address>,
    block_number: Option<U64>,
}

/// Why a confirmation poll did not produce a receipt.
#[derive(Debug)]
enum PollError {
    Pending,
    Rpc(anyhow::Error),
}

/// [`NetworkProvider`] over a JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcProvider {
    rpc: RpcClient,
    signer: TxSigner,
    gas_price: GasPricePolicy,
    chain_id: u64,
}

impl RpcProvider {
    /// Connect to the configured network and resolve the signer identity.
    ///
    /// For [`SignerConfig::Unlocked`] the first account returned by
    /// `eth_accounts` is used.
    pub async fn connect(
        network: &NetworkConfig,
        signer: &SignerConfig,
        secrets: &SignerSecrets,
    ) -> anyhow::Result<Self> {
        let rpc = RpcClient::new(network.rpc_url.clone(), DEFAULT_TIMEOUT)?;

        let chain_id: U64 = rpc
            .call("eth_chainId", vec![])
            .await
            .with_context(|| format!("Failed to reach {}", network.rpc_url))?;
        let chain_id = chain_id.to::<u64>();

        let signer = match TxSigner::local(signer, secrets)? {
            Some(signer) => signer,
            None => {
                let accounts: Vec<Address> = rpc
                    .call("eth_accounts", vec![])
                    .await
                    .context("Failed to list node accounts")?;
                let account = accounts
                    .first()
                    .copied()
                    .context("Node has no unlocked accounts")?;
                TxSigner::Unlocked(account)
            }
        };

        tracing::debug!(
            url = %network.rpc_url,
            chain_id,
            signer = %signer.address(),
            "Connected to network"
        );

        Ok(Self {
            rpc,
            signer,
            gas_price: network.gas_price.clone(),
            chain_id,
        })
    }

    /// The address transactions are sent from.
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn send(&self, tx: TxRequest) -> anyhow::Result<B256> {
        match &self.signer {
            TxSigner::Local(signer) => {
                let legacy = TxLegacy {
                    chain_id: Some(self.chain_id),
                    nonce: tx.nonce,
                    gas_price: tx.gas_price,
                    gas_limit: tx.gas_limit,
                    to: tx.to.map(TxKind::Call).unwrap_or(TxKind::Create),
                    value: U256::ZERO,
                    input: tx.data,
                };
                let raw = sign_legacy(signer, legacy)?;
                self.rpc
                    .call("eth_sendRawTransaction", vec![json!(raw)])
                    .await
            }
            TxSigner::Unlocked(_) => {
                let mut request = json!({
                    "from": tx.from,
                    "data": tx.data,
                    "nonce": format!("{:#x}", tx.nonce),
                    "gas": format!("{:#x}", tx.gas_limit),
                    "gasPrice": format!("{:#x}", tx.gas_price),
                });
                if let Some(to) = tx.to {
                    request["to"] = json!(to);
                }
                self.rpc.call("eth_sendTransaction", vec![request]).await
            }
        }
    }

    async fn poll_receipt(&self, tx_hash: B256, confirmations: u64) -> Result<Receipt, PollError> {
        let receipt: Option<RpcReceipt> = self
            .rpc
            .call("eth_getTransactionReceipt", vec![json!(tx_hash)])
            .await
            .map_err(PollError::Rpc)?;

        let Some(receipt) = receipt else {
            return Err(PollError::Pending);
        };
        let Some(block_number) = receipt.block_number else {
            return Err(PollError::Pending);
        };
        let block_number = block_number.to::<u64>();

        let head: U64 = self
            .rpc
            .call("eth_blockNumber", vec![])
            .await
            .map_err(PollError::Rpc)?;
        if head.to::<u64>() + 1 < block_number + confirmations {
            return Err(PollError::Pending);
        }

        Ok(Receipt {
            tx_hash: receipt.transaction_hash,
            status: receipt.status.is_none_or(|status| status != U64::ZERO),
            contract_address: receipt.contract_address,
            block_number,
        })
    }
}

impl NetworkProvider for RpcProvider {
    async fn chain_id(&self) -> DeployResult<u64> {
        Ok(self.chain_id)
    }

    async fn transaction_count(&self, address: Address) -> DeployResult<u64> {
        let count: U64 = self
            .rpc
            .call(
                "eth_getTransactionCount",
                vec![json!(address), json!("pending")],
            )
            .await
            .map_err(|e| DeployError::Provider(format!("{e:#}")))?;
        Ok(count.to::<u64>())
    }

    async fn gas_price(&self) -> DeployResult<u128> {
        match &self.gas_price {
            GasPricePolicy::Fixed { wei } => Ok(u128::from(*wei)),
            GasPricePolicy::Node => {
                let price: U128 = self
                    .rpc
                    .call("eth_gasPrice", vec![])
                    .await
                    .map_err(|e| DeployError::Provider(format!("{e:#}")))?;
                Ok(price.to::<u128>())
            }
        }
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Option<Address>,
        data: &Bytes,
    ) -> DeployResult<u64> {
        let mut request = json!({ "from": from, "data": data });
        if let Some(to) = to {
            request["to"] = json!(to);
        }

        let estimate: U64 = self
            .rpc
            .call("eth_estimateGas", vec![request])
            .await
            .map_err(|e| DeployError::Provider(format!("{e:#}")))?;
        let estimate = estimate.to::<u64>();

        Ok(estimate + estimate * GAS_ESTIMATE_MARGIN_PERCENT / 100)
    }

    async fn submit(&self, tx: TxRequest) -> DeployResult<PendingTx> {
        let nonce = tx.nonce;
        let tx_hash = self
            .send(tx)
            .await
            .map_err(|e| DeployError::Provider(format!("{e:#}")))?;

        tracing::debug!(%tx_hash, nonce, "Transaction submitted");
        Ok(PendingTx { tx_hash })
    }

    async fn wait(&self, pending: &PendingTx, policy: &ConfirmationPolicy) -> DeployResult<Receipt> {
        let tx_hash = pending.tx_hash;
        let max_polls = (policy.timeout.as_millis() / policy.poll_interval.as_millis().max(1))
            .max(1) as usize;

        let backoff = ConstantBuilder::default()
            .with_delay(policy.poll_interval)
            .with_max_times(max_polls);

        let result = (|| self.poll_receipt(tx_hash, policy.confirmations))
            .retry(backoff)
            .notify(|err: &PollError, dur: Duration| {
                tracing::trace!(%tx_hash, ?err, ?dur, "Waiting for confirmation");
            })
            .await;

        match result {
            Ok(receipt) => Ok(receipt),
            Err(PollError::Pending) => Err(DeployError::ConfirmationTimeout {
                tx_hash,
                waited: policy.timeout,
            }),
            Err(PollError::Rpc(e)) => Err(DeployError::Provider(format!(
                "failed to fetch receipt of {tx_hash}: {e:#}"
            ))),
        }
    }

    async fn call(&self, to: Address, data: Bytes) -> DeployResult<Bytes> {
        self.rpc
            .call(
                "eth_call",
                vec![json!({ "to": to, "data": data }), json!("latest")],
            )
            .await
            .map_err(|e| DeployError::Provider(format!("eth_call to {to} failed: {e:#}")))
    }
}
