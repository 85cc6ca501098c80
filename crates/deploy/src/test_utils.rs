//! In-memory network used by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy_core::primitives::{Address, B256, Bytes, address, keccak256};

use crate::{
    artifacts::ArtifactStore,
    component::{AbiValue, encode_params},
    error::{DeployError, DeployResult},
    network::ConfirmationPolicy,
    provider::{NetworkProvider, PendingTx, Receipt, TxRequest},
    registry::{ArtifactRegistry, NetworkIdentity},
    submitter::TxSubmitter,
};

pub const TEST_CHAIN_ID: u64 = 1337;

/// First hardhat/anvil development account.
pub fn deployer_address() -> Address {
    address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
}

pub fn governance_address() -> Address {
    address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
}

pub fn token_address() -> Address {
    address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC")
}

/// Artifacts whose bytecode is the contract name, so each is recognizable.
pub fn test_artifacts() -> ArtifactStore {
    ["PoolCreator", "SwapFactory", "ReferralFeeReceiver"]
        .into_iter()
        .fold(ArtifactStore::default(), |store, name| {
            store.with_bytecode(name, Bytes::copy_from_slice(name.as_bytes()))
        })
}

pub fn test_registry() -> ArtifactRegistry {
    ArtifactRegistry::in_memory(NetworkIdentity {
        name: "localhost".to_string(),
        chain_id: TEST_CHAIN_ID,
    })
}

pub fn test_submitter(network: &MockNetwork) -> TxSubmitter<MockNetwork> {
    TxSubmitter::new(
        network.clone(),
        deployer_address(),
        ConfirmationPolicy::default(),
    )
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A transaction accepted by the mock network.
#[derive(Debug, Clone)]
pub struct MockTx {
    pub nonce: u64,
    pub to: Option<Address>,
    pub data: Bytes,
    pub tx_hash: B256,
}

impl MockTx {
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
    }
}

/// Observable network activity, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Submitted(B256),
    Confirmed(B256),
}

#[derive(Debug, Default)]
struct MockState {
    nonce: u64,
    block: u64,
    transactions: Vec<MockTx>,
    receipts: HashMap<B256, Receipt>,
    events: Vec<MockEvent>,
    /// Results of read-only calls, keyed by contract and getter selector.
    views: HashMap<(Address, [u8; 4]), Bytes>,
    /// Setter selector to the getter selector it updates.
    setters: HashMap<[u8; 4], [u8; 4]>,
    rejected_selectors: HashSet<[u8; 4]>,
    reverted_selectors: HashSet<[u8; 4]>,
    reverted_code: Vec<Bytes>,
    stalled: bool,
}

/// A single-signer chain that mines every accepted transaction immediately.
///
/// Nonces must be submitted in sequence. Contract addresses follow the
/// `CREATE` derivation from the sender and nonce. Every created contract
/// reports its creator from `owner()`.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    state: Arc<Mutex<MockState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        let network = Self::default();
        network.link_setter("transferOwnership(address)", "owner()");
        network.link_setter("setGovernanceWallet(address)", "governanceWallet()");
        network.link_setter("setFeeCollector(address)", "feeCollector()");
        network
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// A successful call to `setter` updates what `getter` returns.
    pub fn link_setter(&self, setter: &str, getter: &str) {
        self.state()
            .setters
            .insert(selector(setter), selector(getter));
    }

    /// Reject submissions whose calldata starts with `selector`.
    pub fn reject_calls_to_selector(&self, selector: &[u8; 4]) {
        self.state().rejected_selectors.insert(*selector);
    }

    /// Mine calls with the given signature as reverted.
    pub fn revert_calls_to(&self, signature: &str) {
        self.state().reverted_selectors.insert(selector(signature));
    }

    /// Mine contract creations starting with `code` as reverted.
    pub fn revert_deployments_of(&self, code: &Bytes) {
        self.state().reverted_code.push(code.clone());
    }

    /// Never confirm any transaction.
    pub fn stall_confirmations(&self) {
        self.state().stalled = true;
    }

    /// Drop every scripted failure.
    pub fn heal(&self) {
        let mut state = self.state();
        state.rejected_selectors.clear();
        state.reverted_selectors.clear();
        state.reverted_code.clear();
        state.stalled = false;
    }

    pub fn transactions(&self) -> Vec<MockTx> {
        self.state().transactions.clone()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    pub fn submitted_nonces(&self) -> Vec<u64> {
        self.state().transactions.iter().map(|tx| tx.nonce).collect()
    }

    /// Number of successful contract creations.
    pub fn construction_count(&self) -> usize {
        let state = self.state();
        state
            .transactions
            .iter()
            .filter(|tx| tx.to.is_none())
            .filter(|tx| state.receipts.get(&tx.tx_hash).is_some_and(|r| r.status))
            .count()
    }

    /// Accepted calls to `signature` on `contract`.
    pub fn calls_to(&self, contract: Address, signature: &str) -> Vec<MockTx> {
        let wanted = selector(signature);
        self.state()
            .transactions
            .iter()
            .filter(|tx| tx.to == Some(contract) && tx.selector() == Some(wanted))
            .cloned()
            .collect()
    }
}

impl MockState {
    fn mine(&mut self, tx: &TxRequest) -> Receipt {
        self.block += 1;
        let tx_hash = keccak256(
            [
                tx.from.as_slice(),
                &tx.nonce.to_be_bytes()[..],
                &tx.data[..],
            ]
            .concat(),
        );

        let selector = tx.data.get(..4).map(|s| [s[0], s[1], s[2], s[3]]);
        let reverted = match tx.to {
            None => self
                .reverted_code
                .iter()
                .any(|code| tx.data.starts_with(code)),
            Some(_) => selector.is_some_and(|s| self.reverted_selectors.contains(&s)),
        };

        let mut contract_address = None;
        if !reverted {
            match tx.to {
                None => {
                    let created = tx.from.create(tx.nonce);
                    let owner = encode_params(&[AbiValue::Address(tx.from)]);
                    self.views
                        .insert((created, crate::test_utils::selector("owner()")), owner.into());
                    contract_address = Some(created);
                }
                Some(to) => {
                    let getter = selector.and_then(|s| self.setters.get(&s).copied());
                    if let Some(getter) = getter {
                        self.views
                            .insert((to, getter), Bytes::copy_from_slice(&tx.data[4..]));
                    }
                }
            }
        }

        Receipt {
            tx_hash,
            status: !reverted,
            contract_address,
            block_number: self.block,
        }
    }
}

impl NetworkProvider for MockNetwork {
    async fn chain_id(&self) -> DeployResult<u64> {
        Ok(TEST_CHAIN_ID)
    }

    async fn transaction_count(&self, _address: Address) -> DeployResult<u64> {
        Ok(self.state().nonce)
    }

    async fn gas_price(&self) -> DeployResult<u128> {
        Ok(1)
    }

    async fn estimate_gas(
        &self,
        _from: Address,
        _to: Option<Address>,
        _data: &Bytes,
    ) -> DeployResult<u64> {
        Ok(100_000)
    }

    async fn submit(&self, tx: TxRequest) -> DeployResult<PendingTx> {
        // Give other submitters a chance to interleave.
        tokio::task::yield_now().await;

        let mut state = self.state();
        let selector = tx.data.get(..4).map(|s| [s[0], s[1], s[2], s[3]]);
        if selector.is_some_and(|s| state.rejected_selectors.contains(&s)) {
            return Err(DeployError::Provider(
                "execution reverted during gas estimation".to_string(),
            ));
        }
        if tx.nonce != state.nonce {
            return Err(DeployError::Provider(format!(
                "nonce {} does not match expected {}",
                tx.nonce, state.nonce
            )));
        }

        let receipt = state.mine(&tx);
        let tx_hash = receipt.tx_hash;
        state.nonce += 1;
        state.transactions.push(MockTx {
            nonce: tx.nonce,
            to: tx.to,
            data: tx.data,
            tx_hash,
        });
        state.receipts.insert(tx_hash, receipt);
        state.events.push(MockEvent::Submitted(tx_hash));

        Ok(PendingTx { tx_hash })
    }

    async fn wait(&self, pending: &PendingTx, policy: &ConfirmationPolicy) -> DeployResult<Receipt> {
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut state = self.state();
        if state.stalled {
            return Err(DeployError::ConfirmationTimeout {
                tx_hash: pending.tx_hash,
                waited: policy.timeout,
            });
        }

        let receipt = state
            .receipts
            .get(&pending.tx_hash)
            .cloned()
            .ok_or_else(|| DeployError::Provider(format!("unknown transaction {}", pending.tx_hash)))?;
        state.events.push(MockEvent::Confirmed(pending.tx_hash));

        Ok(receipt)
    }

    async fn call(&self, to: Address, data: Bytes) -> DeployResult<Bytes> {
        let Some(selector) = data.get(..4).map(|s| [s[0], s[1], s[2], s[3]]) else {
            return Err(DeployError::Provider("call without selector".to_string()));
        };

        Ok(self
            .state()
            .views
            .get(&(to, selector))
            .cloned()
            .unwrap_or_else(|| Bytes::from(vec![0u8; 32])))
    }
}
