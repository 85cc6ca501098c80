//! swapkit deploys the swap protocol's contracts, records them per network and
//! hands the protocol over to governance.

mod cli;

use std::{collections::BTreeSet, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;

use cli::{Cli, Command};
use swapkit_deploy::{
    ArtifactRegistry, ComponentName, Deployer, DeployerBuilder, RedeployPolicy, SignerSecrets, registry_table,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match &cli.command {
        Command::Deploy {
            redeploy,
            redeploy_component,
        } => {
            let policy = if *redeploy {
                RedeployPolicy::All
            } else if redeploy_component.is_empty() {
                RedeployPolicy::Never
            } else {
                RedeployPolicy::Only(
                    redeploy_component
                        .iter()
                        .map(|name| ComponentName::from(name.as_str()))
                        .collect::<BTreeSet<_>>(),
                )
            };

            let deployer = deployer(&cli)?;
            deployer.required_token()?;

            // Save the configuration to Swapkit.toml before deploying
            deployer.save_config()?;

            let (abort_tx, abort_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping after the current step...");
                    let _ = abort_tx.send(true);
                }
            });

            let report = deployer.deploy(policy, Some(abort_rx)).await?;
            println!("{report}");

            if !report.is_success() {
                anyhow::bail!("Deployment on {} did not complete", report.network.name);
            }
        }
        Command::Status => {
            let registry = match &cli.config {
                Some(config_path) => Deployer::load_from_file(&PathBuf::from(config_path))?.status()?,
                None => ArtifactRegistry::load(
                    &PathBuf::from(&cli.outdata),
                    cli.network.registry_name(),
                )?,
            };

            match registry {
                Some(registry) => {
                    println!(
                        "Network {} (chain {})",
                        registry.network().name,
                        registry.network().chain_id
                    );
                    println!("{}", registry_table(registry.records()));
                }
                None => println!("Nothing deployed yet"),
            }
        }
        Command::Accounts => {
            let deployer = deployer(&cli)?;
            println!("{}", deployer.signer_address().await?);
        }
    }

    Ok(())
}

/// Load the deployer from a saved configuration, or build it from the CLI
/// arguments.
fn deployer(cli: &Cli) -> Result<Deployer> {
    if let Some(config_path) = &cli.config {
        let config_path = PathBuf::from(config_path);
        let deployer =
            Deployer::load_from_file(&config_path)?.with_accounts(cli.token, cli.governance);

        tracing::info!(
            config_path = %config_path.display(),
            outdata_path = %deployer.outdata.display(),
            network = %deployer.network.name,
            "Loading deployment from config file..."
        );

        return Ok(deployer);
    }

    let mut builder = DeployerBuilder::new(cli.network)?
        .secrets(SignerSecrets::from_env())
        .mnemonic_index(cli.mnemonic_index)
        .outdata_path(&cli.outdata)
        .artifacts_path(&cli.artifacts);

    if let Some(rpc_url) = &cli.rpc_url {
        builder = builder.rpc_url(rpc_url.clone());
    }

    if let Some(chain_id) = cli.chain_id {
        builder = builder.chain_id(chain_id);
    }

    if let Some(confirmations) = cli.confirmations {
        builder = builder.confirmations(confirmations);
    }

    if let Some(timeout) = cli.confirmation_timeout {
        builder = builder.confirmation_timeout_secs(timeout);
    }

    if let Some(token) = cli.token {
        builder = builder.token(token);
    }

    if let Some(governance) = cli.governance {
        builder = builder.governance(governance);
    }

    builder.build()
}
