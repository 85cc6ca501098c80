//! Nonce-serialized transaction submission for a single signer.

use alloy_core::primitives::{Address, Bytes};
use tokio::sync::Mutex;

use crate::{
    error::DeployResult,
    network::ConfirmationPolicy,
    provider::{NetworkProvider, PendingTx, Receipt, TxRequest},
};

/// Submits transactions from one signer through a single nonce sequence.
///
/// The nonce lock is held from nonce assignment until the node acknowledges
/// the transaction, so concurrent callers never share a nonce. Confirmation
/// waits happen outside the lock.
#[derive(Debug)]
pub struct TxSubmitter<P> {
    provider: P,
    from: Address,
    policy: ConfirmationPolicy,
    /// The next nonce to use, or `None` when it must be fetched from the node.
    next_nonce: Mutex<Option<u64>>,
}

impl<P: NetworkProvider> TxSubmitter<P> {
    pub fn new(provider: P, from: Address, policy: ConfirmationPolicy) -> Self {
        Self {
            provider,
            from,
            policy,
            next_nonce: Mutex::new(None),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn address(&self) -> Address {
        self.from
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    /// Submit a transaction (`to == None` creates a contract).
    ///
    /// A rejected submission does not consume the nonce: the cached value is
    /// dropped and re-read from the node on the next call.
    pub async fn submit(&self, to: Option<Address>, data: Bytes) -> DeployResult<PendingTx> {
        let mut next_nonce = self.next_nonce.lock().await;

        let result = self.submit_locked(&mut next_nonce, to, data).await;
        if result.is_err() {
            *next_nonce = None;
        }
        result
    }

    async fn submit_locked(
        &self,
        next_nonce: &mut Option<u64>,
        to: Option<Address>,
        data: Bytes,
    ) -> DeployResult<PendingTx> {
        let nonce = match *next_nonce {
            Some(nonce) => nonce,
            None => self.provider.transaction_count(self.from).await?,
        };

        let gas_limit = self.provider.estimate_gas(self.from, to, &data).await?;
        let gas_price = self.provider.gas_price().await?;

        let pending = self
            .provider
            .submit(TxRequest {
                from: self.from,
                to,
                data,
                nonce,
                gas_limit,
                gas_price,
            })
            .await?;

        *next_nonce = Some(nonce + 1);
        Ok(pending)
    }

    /// Wait for the configured confirmations of a submitted transaction.
    pub async fn confirm(&self, pending: &PendingTx) -> DeployResult<Receipt> {
        self.provider.wait(pending, &self.policy).await
    }
}
