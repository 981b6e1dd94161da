//! Layered deployment configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file, `MYSO_`
//! environment variables (nested keys separated by `__`, e.g.
//! `MYSO_PRESALE__START_TIME`), then whatever the caller merges on top.

use std::{fmt, path::PathBuf, time::Duration};

use alloy_core::primitives::{Address, address};
use anyhow::{Context, Result};
use chrono::DateTime;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize, de};
use url::Url;

use crate::{DeploymentContext, RawParameters, StartTime};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Deploy.toml";

/// Prefix of the environment variables read into the configuration.
pub const ENV_PREFIX: &str = "MYSO_";

/// USDC on Base testnet.
pub const DEFAULT_STABLE_ASSET: Address = address!("8A04d904055528a69f3E4594DDA308A31aeb8457");

/// 2025-01-16T18:00:00Z
pub const DEFAULT_PRESALE_START: &str = "2025-01-16T18:00:00Z";

/// Seven days.
pub const DEFAULT_PRESALE_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Keyword selecting the resolution time as presale start.
const START_NOW: &str = "now";

/// Presale amounts, read from the environment as verbatim text.
const AMOUNT_KEYS: [&str; 4] = [
    "presale.total_presale_tokens",
    "presale.max_claim_per_wallet",
    "presale.base_price",
    "presale.growth_rate",
];

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// JSON-RPC endpoint of the target network.
    pub rpc_url: Url,
    /// Chain id the endpoint must report, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Hex-encoded deployer private key.
    pub private_key: String,
    /// Stable asset accepted by the presale.
    pub stable_asset: Address,
    /// Hardhat artifacts directory holding the compiled contracts.
    pub artifacts_dir: PathBuf,
    /// Where the JSON deployment record is written.
    pub deployments_path: PathBuf,
    /// How long to wait for each transaction receipt.
    pub receipt_timeout_secs: u64,
    pub token: TokenConfig,
    pub presale: PresaleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
}

/// Presale inputs in human units. Amounts accept decimal strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresaleConfig {
    #[serde(deserialize_with = "decimal_string")]
    pub total_presale_tokens: String,
    #[serde(deserialize_with = "decimal_string")]
    pub max_claim_per_wallet: String,
    #[serde(deserialize_with = "decimal_string")]
    pub base_price: String,
    #[serde(deserialize_with = "decimal_string")]
    pub growth_rate: String,
    /// RFC 3339 timestamp, unix seconds, or `now`.
    #[serde(deserialize_with = "decimal_string")]
    pub start_time: String,
    pub duration_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse("http://127.0.0.1:8545").expect("default RPC URL is valid"),
            chain_id: None,
            private_key: String::new(),
            stable_asset: DEFAULT_STABLE_ASSET,
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_path: PathBuf::from("deployments/mysocial.json"),
            receipt_timeout_secs: 120,
            token: TokenConfig::default(),
            presale: PresaleConfig::default(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "MySocial".to_string(),
            symbol: "MYSO".to_string(),
        }
    }
}

impl Default for PresaleConfig {
    fn default() -> Self {
        Self {
            total_presale_tokens: "100000000".to_string(),
            max_claim_per_wallet: "10000000".to_string(),
            base_price: "0.0001".to_string(),
            growth_rate: "0.00001".to_string(),
            start_time: DEFAULT_PRESALE_START.to_string(),
            duration_secs: DEFAULT_PRESALE_DURATION_SECS,
        }
    }
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let private_key = if self.private_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };

        f.debug_struct("DeployConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("chain_id", &self.chain_id)
            .field("private_key", &private_key)
            .field("stable_asset", &self.stable_asset)
            .field("artifacts_dir", &self.artifacts_dir)
            .field("deployments_path", &self.deployments_path)
            .field("receipt_timeout_secs", &self.receipt_timeout_secs)
            .field("token", &self.token)
            .field("presale", &self.presale)
            .finish()
    }
}

impl DeployConfig {
    /// Defaults, then `path` (if it exists), then the environment.
    pub fn figment(path: impl Into<PathBuf>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(DeployConfig::default()))
            .merge(Toml::file(path.into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&AMOUNT_KEYS));

        // `Env` parses `0.1` into a float, so amounts skip it and stay text.
        for (key, value) in Env::prefixed(ENV_PREFIX).split("__").only(&AMOUNT_KEYS).iter() {
            let key = key.as_str().to_ascii_lowercase();
            figment = figment.merge(Serialized::default(&key, value));
        }

        figment
    }

    /// Extract the configuration from a figment built by [`DeployConfig::figment`].
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        figment
            .extract()
            .context("Failed to load deployment configuration")
    }

    /// Load from `path` and the environment.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        Self::from_figment(&Self::figment(path))
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    /// Presale inputs for the parameter resolver.
    pub fn raw_parameters(&self) -> Result<RawParameters> {
        Ok(RawParameters {
            total_presale_tokens: self.presale.total_presale_tokens.clone(),
            max_claim_per_wallet: self.presale.max_claim_per_wallet.clone(),
            base_price: self.presale.base_price.clone(),
            growth_rate: self.presale.growth_rate.clone(),
            start: parse_start_time(&self.presale.start_time)?,
            duration_secs: self.presale.duration_secs,
        })
    }

    /// Run context for a deployment sent by `owner`.
    pub fn context(&self, owner: Address) -> DeploymentContext {
        DeploymentContext {
            owner,
            stable_asset: self.stable_asset,
            token_name: self.token.name.clone(),
            token_symbol: self.token.symbol.clone(),
        }
    }
}

/// Parse a presale start: `now`, unix seconds, or an RFC 3339 timestamp.
pub fn parse_start_time(value: &str) -> Result<StartTime> {
    let value = value.trim();
    if value.eq_ignore_ascii_case(START_NOW) {
        return Ok(StartTime::Now);
    }

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let timestamp = value
            .parse()
            .with_context(|| format!("Presale start {value} does not fit in a unix timestamp"))?;
        return Ok(StartTime::At(timestamp));
    }

    let datetime = DateTime::parse_from_rfc3339(value).with_context(|| {
        format!("Invalid presale start {value:?}: expected RFC 3339, unix seconds or `now`")
    })?;
    let timestamp = u64::try_from(datetime.timestamp())
        .with_context(|| format!("Presale start {value} is before the unix epoch"))?;

    Ok(StartTime::At(timestamp))
}

/// Accepts a string or an integer and keeps its decimal text.
///
/// Floats are rejected: `base_price = 0.0001` has already been rounded to the
/// nearest binary value by the time it gets here.
fn decimal_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct DecimalVisitor;

    impl de::Visitor<'_> for DecimalVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal number or string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u128<E: de::Error>(self, value: u128) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
            Err(E::custom(format_args!(
                "fractional amount {value} must be quoted, e.g. \"0.0001\", to be read exactly"
            )))
        }
    }

    deserializer.deserialize_any(DecimalVisitor)
}
