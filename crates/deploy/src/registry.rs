//! Persistent registry of deployed components.
//!
//! The registry is the idempotence source of truth: a component with a record
//! for the current network is never constructed again. Each network gets its
//! own JSON file under `{outdata}/deployments/`, keyed by component name in a
//! sorted map so slots stay stable across runs.

use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    component::{AbiValue, ComponentName},
    error::{DeployError, DeployResult},
};

/// Directory (relative to the output data directory) holding registry files.
pub const REGISTRY_DIR: &str = "deployments";

/// The network a deployment belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentity {
    /// The configured network name, e.g. `bsc_testnet`.
    pub name: String,
    /// The chain id reported by the node.
    pub chain_id: u64,
}

/// A single deployed component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Stored as the map key in the registry file.
    #[serde(skip)]
    pub component_name: ComponentName,
    /// Stored once at the top of the registry file.
    #[serde(skip)]
    pub network: NetworkIdentity,
    pub address: Address,
    /// The resolved constructor arguments the component was built with.
    pub constructor_args: Vec<AbiValue>,
    /// SHA-256 of `constructor_args`, used to detect configuration drift.
    pub args_hash: String,
    pub transaction_hash: B256,
    /// Unix timestamp of the confirmation.
    pub deployed_at: i64,
}

/// Compute the hash of a list of resolved constructor arguments.
///
/// The arguments are serialized to JSON before hashing so the same arguments
/// always produce the same hash.
pub fn args_hash(args: &[AbiValue]) -> DeployResult<String> {
    let json = serde_json::to_string(args)
        .map_err(|e| DeployError::Registry(format!("failed to serialize arguments: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// On-disk layout of a registry file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    network: String,
    chain_id: u64,
    components: BTreeMap<ComponentName, DeploymentRecord>,
}

/// Key-value store mapping component names to deployment records.
///
/// Writes go through to disk before [`ArtifactRegistry::put`] returns. Several
/// handles may be open on the same file; each write merges with what the others
/// stored.
#[derive(Debug)]
pub struct ArtifactRegistry {
    network: NetworkIdentity,
    path: Option<PathBuf>,
    records: BTreeMap<ComponentName, DeploymentRecord>,
}

impl ArtifactRegistry {
    /// Create a registry that is never persisted.
    pub fn in_memory(network: NetworkIdentity) -> Self {
        Self {
            network,
            path: None,
            records: BTreeMap::new(),
        }
    }

    /// Path of the registry file for a network inside an output directory.
    pub fn file_path(outdata: &Path, network: &str) -> PathBuf {
        outdata.join(REGISTRY_DIR).join(format!("{network}.json"))
    }

    /// Open the registry of `network` inside `outdata`, loading prior records.
    ///
    /// Fails with [`DeployError::RegistryMismatch`] when the file was written
    /// for another chain.
    pub fn open(outdata: &Path, network: NetworkIdentity) -> DeployResult<Self> {
        let path = Self::file_path(outdata, &network.name);

        let mut records = BTreeMap::new();
        if path.exists() {
            let file = Self::load_file(&path)?;
            if file.chain_id != network.chain_id {
                return Err(DeployError::RegistryMismatch {
                    expected: network.chain_id,
                    found: file.chain_id,
                });
            }
            records = Self::into_records(file, &network);

            tracing::debug!(
                path = %path.display(),
                records = records.len(),
                "Registry loaded"
            );
        }

        Ok(Self {
            network,
            path: Some(path),
            records,
        })
    }

    /// Read the registry of `network` as it is on disk, whatever chain it was
    /// written for. Returns `None` when nothing was deployed yet.
    pub fn load(outdata: &Path, network: &str) -> DeployResult<Option<Self>> {
        let path = Self::file_path(outdata, network);
        if !path.exists() {
            return Ok(None);
        }

        let file = Self::load_file(&path)?;
        let network = NetworkIdentity {
            name: file.network.clone(),
            chain_id: file.chain_id,
        };
        let records = Self::into_records(file, &network);

        Ok(Some(Self {
            network,
            path: Some(path),
            records,
        }))
    }

    fn into_records(
        file: RegistryFile,
        network: &NetworkIdentity,
    ) -> BTreeMap<ComponentName, DeploymentRecord> {
        file.components
            .into_iter()
            .map(|(name, mut record)| {
                record.component_name = name.clone();
                record.network = network.clone();
                (name, record)
            })
            .collect()
    }

    fn load_file(path: &Path) -> DeployResult<RegistryFile> {
        let content = fs::read_to_string(path).map_err(|e| {
            DeployError::Registry(format!("failed to read {}: {e}", path.display()))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            DeployError::Registry(format!("failed to parse {}: {e}", path.display()))
        })
    }

    pub fn network(&self) -> &NetworkIdentity {
        &self.network
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up the record of a component.
    pub fn get(&self, name: &ComponentName) -> Option<&DeploymentRecord> {
        self.records.get(name)
    }

    /// Store a record and flush the registry to disk.
    ///
    /// The file is re-read under the lock first, so records written by another
    /// handle on the same outdata since this one was opened are kept.
    pub fn put(&mut self, mut record: DeploymentRecord) -> DeployResult<()> {
        record.network = self.network.clone();
        let name = record.component_name.clone();

        let Some(path) = self.path.clone() else {
            self.records.insert(name, record);
            return Ok(());
        };

        let lock = Self::lock(&path)?;
        let result = self.merge_and_write(&path, name, record);

        if let Err(e) = FileExt::unlock(&lock) {
            tracing::warn!(err = %e, "Failed to release registry lock");
        }

        result
    }

    /// All records, ordered by component name.
    pub fn records(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn lock(path: &Path) -> DeployResult<File> {
        let parent = path
            .parent()
            .ok_or_else(|| DeployError::Registry("registry path has no parent".to_string()))?;
        fs::create_dir_all(parent).map_err(|e| {
            DeployError::Registry(format!("failed to create {}: {e}", parent.display()))
        })?;

        let lock_path = path.with_extension("json.lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                DeployError::Registry(format!("failed to open {}: {e}", lock_path.display()))
            })?;
        lock.lock_exclusive()
            .map_err(|e| DeployError::Registry(format!("failed to lock registry: {e}")))?;

        Ok(lock)
    }

    /// Must be called with the registry lock held. Memory is only updated once
    /// the file has been replaced.
    fn merge_and_write(
        &mut self,
        path: &Path,
        name: ComponentName,
        record: DeploymentRecord,
    ) -> DeployResult<()> {
        let mut records = if path.exists() {
            let file = Self::load_file(path)?;
            if file.chain_id != self.network.chain_id {
                return Err(DeployError::RegistryMismatch {
                    expected: self.network.chain_id,
                    found: file.chain_id,
                });
            }
            Self::into_records(file, &self.network)
        } else {
            BTreeMap::new()
        };
        records.insert(name, record);

        Self::write_atomically(path, &self.network, &records)?;
        self.records = records;
        Ok(())
    }

    fn write_atomically(
        path: &Path,
        network: &NetworkIdentity,
        records: &BTreeMap<ComponentName, DeploymentRecord>,
    ) -> DeployResult<()> {
        let file = RegistryFile {
            network: network.name.clone(),
            chain_id: network.chain_id,
            components: records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| DeployError::Registry(format!("failed to serialize registry: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| {
            DeployError::Registry(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        File::open(&tmp_path)
            .and_then(|f| f.sync_all())
            .map_err(|e| DeployError::Registry(format!("failed to sync registry: {e}")))?;
        fs::rename(&tmp_path, path).map_err(|e| {
            DeployError::Registry(format!("failed to replace {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), records = records.len(), "Registry saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;
    use tempdir::TempDir;

    fn network(chain_id: u64) -> NetworkIdentity {
        NetworkIdentity {
            name: "bsc_testnet".to_string(),
            chain_id,
        }
    }

    fn record(name: &str, address: Address) -> DeploymentRecord {
        let constructor_args = vec![AbiValue::Address(address)];
        DeploymentRecord {
            component_name: name.into(),
            network: NetworkIdentity::default(),
            address,
            args_hash: args_hash(&constructor_args).unwrap(),
            constructor_args,
            transaction_hash: B256::repeat_byte(0x11),
            deployed_at: 1737316800,
        }
    }

    #[test]
    fn test_get_missing_returns_none() {
        let registry = ArtifactRegistry::in_memory(network(97));
        assert!(registry.get(&"PoolCreator".into()).is_none());
    }

    #[test]
    fn test_put_then_get_in_same_run() {
        let mut registry = ArtifactRegistry::in_memory(network(97));
        let addr = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

        registry.put(record("PoolCreator", addr)).unwrap();

        let stored = registry.get(&"PoolCreator".into()).unwrap();
        assert_eq!(stored.address, addr);
        assert_eq!(stored.network, network(97));
    }

    #[test]
    fn test_registry_persists_across_opens() {
        let temp_dir = TempDir::new("swapkit-test").expect("Failed to create temp dir");
        let addr = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

        {
            let mut registry = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();
            registry.put(record("PoolCreator", addr)).unwrap();
        }

        let reopened = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();
        let stored = reopened.get(&"PoolCreator".into()).unwrap();
        assert_eq!(stored.address, addr);
        assert_eq!(stored.component_name.as_str(), "PoolCreator");
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_two_handles_keep_each_others_records() {
        let temp_dir = TempDir::new("swapkit-test").expect("Failed to create temp dir");
        let mut first = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();
        let mut second = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();

        first
            .put(record("PoolCreator", Address::repeat_byte(1)))
            .unwrap();
        second
            .put(record("SwapFactory", Address::repeat_byte(2)))
            .unwrap();

        assert_eq!(
            second.get(&"PoolCreator".into()).unwrap().address,
            Address::repeat_byte(1)
        );

        let reopened = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();
        let names: Vec<&str> = reopened
            .records()
            .map(|r| r.component_name.as_str())
            .collect();
        assert_eq!(names, vec!["PoolCreator", "SwapFactory"]);
    }

    #[test]
    fn test_registry_file_layout_is_keyed_by_name() {
        let temp_dir = TempDir::new("swapkit-test").expect("Failed to create temp dir");
        let mut registry = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();
        registry
            .put(record("SwapFactory", Address::repeat_byte(2)))
            .unwrap();
        registry
            .put(record("PoolCreator", Address::repeat_byte(1)))
            .unwrap();

        let path = ArtifactRegistry::file_path(temp_dir.path(), "bsc_testnet");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(json["chainId"], 97);
        assert_eq!(json["network"], "bsc_testnet");
        let components = json["components"].as_object().unwrap();
        let names: Vec<&String> = components.keys().collect();
        assert_eq!(names, vec!["PoolCreator", "SwapFactory"]);
        assert!(components["PoolCreator"]["transactionHash"].is_string());
        assert!(components["PoolCreator"].get("componentName").is_none());
    }

    #[test]
    fn test_open_with_other_chain_fails() {
        let temp_dir = TempDir::new("swapkit-test").expect("Failed to create temp dir");
        {
            let mut registry = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();
            registry
                .put(record("PoolCreator", Address::repeat_byte(1)))
                .unwrap();
        }

        let err = ArtifactRegistry::open(temp_dir.path(), network(56)).unwrap_err();
        assert!(matches!(
            err,
            DeployError::RegistryMismatch {
                expected: 56,
                found: 97
            }
        ));
    }

    #[test]
    fn test_load_reads_recorded_chain() {
        let temp_dir = TempDir::new("swapkit-test").expect("Failed to create temp dir");
        assert!(
            ArtifactRegistry::load(temp_dir.path(), "bsc_testnet")
                .unwrap()
                .is_none()
        );

        {
            let mut registry = ArtifactRegistry::open(temp_dir.path(), network(97)).unwrap();
            registry
                .put(record("PoolCreator", Address::repeat_byte(1)))
                .unwrap();
        }

        let loaded = ArtifactRegistry::load(temp_dir.path(), "bsc_testnet")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.network(), &network(97));
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_open_corrupted_file_fails() {
        let temp_dir = TempDir::new("swapkit-test").expect("Failed to create temp dir");
        let path = ArtifactRegistry::file_path(temp_dir.path(), "bsc_testnet");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ invalid json }").unwrap();

        let result = ArtifactRegistry::open(temp_dir.path(), network(97));
        assert!(matches!(result, Err(DeployError::Registry(_))));
    }

    #[test]
    fn test_args_hash_changes_with_args() {
        let a = args_hash(&[AbiValue::Address(Address::repeat_byte(1))]).unwrap();
        let b = args_hash(&[AbiValue::Address(Address::repeat_byte(2))]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_eq!(
            a,
            args_hash(&[AbiValue::Address(Address::repeat_byte(1))]).unwrap()
        );
    }
}
