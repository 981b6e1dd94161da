//! mysocial deploys the MySocial contracts and wires them together.

mod cli;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use cli::{Cli, Command};
use mysocial_deploy::{
    ChainClient, ContractRepository, DeployConfig, DeploymentParameters, DeploymentPlan,
    DeploymentRecord, Orchestrator, ParameterResolver, RpcChainClient,
    report::{artifact_table, parameters_table, plan_table},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = cli.overrides.load(&cli.config)?;
    tracing::debug!(config = ?config, "Configuration loaded");

    let raw = config.raw_parameters()?;
    let now = u64::try_from(Utc::now().timestamp())
        .context("System time is before the unix epoch")?;
    let params = ParameterResolver::resolve(&raw, now)?;
    let plan = DeploymentPlan::standard()?;

    match cli.command {
        Command::Plan => {
            println!("{}", plan_table(&plan));
            println!("{}", parameters_table(&params));
            Ok(())
        }
        Command::Deploy => deploy(&config, &plan, &params).await,
    }
}

async fn deploy(
    config: &DeployConfig,
    plan: &DeploymentPlan,
    params: &DeploymentParameters,
) -> Result<()> {
    let contracts = ContractRepository::open(&config.artifacts_dir)?;
    let client = RpcChainClient::connect(config, contracts).await?;
    let chain_id = client.chain_id();
    let deployer = client.sender();

    tracing::info!(
        chain_id,
        deployer = %deployer,
        start_time = params.start_time,
        end_time = params.end_time,
        "Deploying contracts with the account: {}",
        deployer
    );

    let orchestrator = Orchestrator::new(client, config.context(deployer));

    match orchestrator.run(plan, params).await {
        Ok(artifacts) => {
            println!("{}", artifact_table(&artifacts));

            DeploymentRecord::complete(chain_id, deployer, params, &artifacts, Utc::now())
                .save_to_file(&config.deployments_path)?;

            Ok(())
        }
        Err(failure) => {
            if !failure.artifacts.is_empty() {
                println!("{}", artifact_table(&failure.artifacts));
            }

            let record = DeploymentRecord::failed(chain_id, deployer, params, &failure, Utc::now());
            if let Err(err) = record.save_to_file(&config.deployments_path) {
                tracing::error!(error = %err, "Failed to save deployment record");
            }

            Err(failure).context("Deployment failed")
        }
    }
}
