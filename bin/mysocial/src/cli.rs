use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use figment::{Figment, providers::Serialized};
use mysocial_deploy::config::{DEFAULT_CONFIG_FILE, DeployConfig};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "mysocial")]
#[command(
    author,
    version,
    about = "Deploy the MySocial token, registry and presale contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "MYSO_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the deployment configuration file.
    ///
    /// A missing file is not an error: defaults and `MYSO_*` environment
    /// variables are used instead.
    #[arg(long, alias = "conf", env = "MYSO_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Overrides applied on top of the configuration file and environment.
    #[clap(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Deploy every component and wire the presale into the token.
    Deploy,
    /// Resolve parameters and print the deployment plan without touching the chain.
    Plan,
}

/// Command line overrides for the most commonly changed settings.
#[derive(Debug, Clone, Default, Parser)]
pub struct ConfigOverrides {
    /// JSON-RPC endpoint of the target network.
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Chain id the RPC endpoint must report.
    #[arg(long)]
    pub chain_id: Option<u64>,

    /// Hex-encoded deployer private key. Prefer `MYSO_PRIVATE_KEY`.
    #[arg(long)]
    pub private_key: Option<String>,

    /// Address of the stable asset accepted by the presale.
    #[arg(long)]
    pub stable_asset: Option<String>,

    /// Presale start: RFC 3339 timestamp, unix seconds, or `now`.
    #[arg(long)]
    pub start_time: Option<String>,

    /// Presale duration in seconds.
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Merge every provided override into `figment`.
    pub fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(rpc_url) = &self.rpc_url {
            figment = figment.merge(Serialized::default("rpc_url", rpc_url));
        }
        if let Some(chain_id) = self.chain_id {
            figment = figment.merge(Serialized::default("chain_id", chain_id));
        }
        if let Some(private_key) = &self.private_key {
            figment = figment.merge(Serialized::default("private_key", private_key));
        }
        if let Some(stable_asset) = &self.stable_asset {
            figment = figment.merge(Serialized::default("stable_asset", stable_asset));
        }
        if let Some(start_time) = &self.start_time {
            figment = figment.merge(Serialized::default("presale.start_time", start_time));
        }
        if let Some(duration_secs) = self.duration_secs {
            figment = figment.merge(Serialized::default("presale.duration_secs", duration_secs));
        }
        figment
    }

    /// Load the configuration at `path` with these overrides on top.
    pub fn load(&self, path: &Path) -> anyhow::Result<DeployConfig> {
        DeployConfig::from_figment(&self.apply(DeployConfig::figment(path)))
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_cli_parses_plan() {
        let cli = Cli::try_parse_from(["mysocial", "--start-time", "now", "plan"]).unwrap();
        assert_eq!(cli.command, Command::Plan);
        assert_eq!(cli.overrides.start_time.as_deref(), Some("now"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "chain_id = 1\n[presale]\nduration_secs = 60")?;
            jail.set_env("MYSO_RPC_URL", "http://env:8545");

            let overrides = ConfigOverrides {
                rpc_url: Some("http://cli:8545".to_string()),
                chain_id: Some(84531),
                duration_secs: Some(3600),
                ..Default::default()
            };
            let config = overrides
                .load(Path::new(DEFAULT_CONFIG_FILE))
                .expect("config loads");

            assert_eq!(config.rpc_url.as_str(), "http://cli:8545/");
            assert_eq!(config.chain_id, Some(84531));
            assert_eq!(config.presale.duration_secs, 3600);
            Ok(())
        });
    }
}
