//! Integration tests for the registry and configuration API of swapkit-deploy.
//!
//! These tests only touch the filesystem; no node is required.
//! Run with: cargo test --test registry_test

use alloy_core::primitives::{Address, B256, address};
use swapkit_deploy::{
    AbiValue, ArtifactRegistry, DeployError, DeployerBuilder, DeploymentRecord, GasPricePolicy,
    KnownNetwork, NetworkIdentity, SignerConfig, SignerSecrets, args_hash, protocol_pipeline,
    ProtocolConfig, registry_table,
};
use tempdir::TempDir;

fn testnet(chain_id: u64) -> NetworkIdentity {
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
        transaction_hash: B256::repeat_byte(0xab),
        deployed_at: 1737316800,
    }
}

#[test]
fn registry_survives_a_new_process() {
    let temp_dir = TempDir::new("swapkit-it").expect("Failed to create temp dir");
    let pool_creator = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

    let mut registry = ArtifactRegistry::open(temp_dir.path(), testnet(97)).unwrap();
    registry.put(record("PoolCreator", pool_creator)).unwrap();
    drop(registry);

    let path = ArtifactRegistry::file_path(temp_dir.path(), "bsc_testnet");
    assert!(path.ends_with("deployments/bsc_testnet.json"));
    assert!(path.exists());

    let reopened = ArtifactRegistry::open(temp_dir.path(), testnet(97)).unwrap();
    let stored = reopened.get(&"PoolCreator".into()).unwrap();
    assert_eq!(stored.address, pool_creator);
    assert_eq!(stored.network, testnet(97));
    assert_eq!(stored.transaction_hash, B256::repeat_byte(0xab));

    let table = registry_table(reopened.records()).to_string();
    assert!(table.contains("PoolCreator"));
}

#[test]
fn registry_of_another_chain_is_refused() {
    let temp_dir = TempDir::new("swapkit-it").expect("Failed to create temp dir");
    ArtifactRegistry::open(temp_dir.path(), testnet(97))
        .unwrap()
        .put(record("PoolCreator", Address::repeat_byte(1)))
        .unwrap();

    let err = ArtifactRegistry::open(temp_dir.path(), testnet(56)).unwrap_err();
    assert!(matches!(err, DeployError::RegistryMismatch { .. }));
}

#[test]
fn saved_configuration_reloads() {
    let temp_dir = TempDir::new("swapkit-it").expect("Failed to create temp dir");
    let token = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");
    let governance = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    let deployer = DeployerBuilder::new(KnownNetwork::BscTestnet)
        .unwrap()
        .secrets(SignerSecrets {
            mnemonic: Some("test test test test test test test test test test test junk".to_string()),
            private_key: None,
        })
        .token(token)
        .governance(governance)
        .outdata_path(temp_dir.path())
        .build()
        .unwrap();
    let path = deployer.save_config().unwrap();

    let loaded = swapkit_deploy::Deployer::load_from_file(&path).unwrap();
    assert_eq!(loaded.signer, SignerConfig::Mnemonic { index: 0 });
    assert_eq!(loaded.token, Some(token));
    assert_eq!(loaded.governance, Some(governance));
    assert_eq!(loaded.network.chain_id, Some(97));
    assert_eq!(
        loaded.network.gas_price,
        GasPricePolicy::Fixed {
            wei: 20_000_000_000
        }
    );
}

#[test]
fn protocol_pipeline_hands_over_to_governance_last() {
    let pipeline = protocol_pipeline(&ProtocolConfig {
        deployer: Address::repeat_byte(1),
        governance: Address::repeat_byte(2),
        token: Address::repeat_byte(3),
    });
    pipeline.validate().unwrap();

    let last = pipeline.steps().last().unwrap();
    let swapkit_deploy::StepKind::Wire(stage) = &last.kind else {
        panic!("last step should be the wiring stage");
    };
    let final_batch = stage.batches.last().unwrap();
    assert_eq!(final_batch.actions.len(), 1);
    assert_eq!(final_batch.actions[0].operation, "transferOwnership");
    assert_eq!(final_batch.actions[0].target.as_str(), "SwapFactory");
}
