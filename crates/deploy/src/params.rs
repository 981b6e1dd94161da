//! Derivation of the presale parameters from human-scale inputs.

use alloy_core::primitives::{U256, utils::parse_ether};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::DeployError;

/// Number of decimals of the fixed-point representation shared by every amount.
pub const FIXED_POINT_DECIMALS: usize = 18;

/// Where the presale window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartTime {
    /// A fixed unix timestamp, in seconds.
    At(u64),
    /// The `now` value handed to the resolver.
    Now,
}

/// Raw presale inputs, as an operator writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParameters {
    pub total_presale_tokens: String,
    pub max_claim_per_wallet: String,
    pub base_price: String,
    pub growth_rate: String,
    pub start: StartTime,
    pub duration_secs: u64,
}

/// Parameters handed to the presale deployment.
///
/// Amounts are 18-decimal fixed-point integers, times are unix seconds.
/// `start_time < end_time` always holds for values built by [`ParameterResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentParameters {
    pub total_supply_cap: U256,
    pub max_claim_per_wallet: U256,
    pub start_time: u64,
    pub end_time: u64,
    pub base_price: U256,
    pub growth_rate: U256,
}

impl DeploymentParameters {
    /// SHA-256 over the serialized parameters, hex-encoded.
    ///
    /// Two runs configured with the same parameters share the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self)
            .expect("DeploymentParameters serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Length of the presale window in seconds.
    pub fn window_secs(&self) -> u64 {
        self.end_time - self.start_time
    }
}

/// Computes [`DeploymentParameters`] from [`RawParameters`].
///
/// Resolution is pure: the current time is an input, never read from the clock.
pub struct ParameterResolver;

impl ParameterResolver {
    pub fn resolve(raw: &RawParameters, now: u64) -> Result<DeploymentParameters, DeployError> {
        let start_time = match raw.start {
            StartTime::At(timestamp) => timestamp,
            StartTime::Now => now,
        };

        let invalid_window = DeployError::InvalidWindow {
            start_time,
            duration_secs: raw.duration_secs,
        };
        if raw.duration_secs == 0 {
            return Err(invalid_window);
        }
        let end_time = start_time
            .checked_add(raw.duration_secs)
            .ok_or(invalid_window)?;

        Ok(DeploymentParameters {
            total_supply_cap: to_fixed_point("total_presale_tokens", &raw.total_presale_tokens)?,
            max_claim_per_wallet: to_fixed_point("max_claim_per_wallet", &raw.max_claim_per_wallet)?,
            start_time,
            end_time,
            base_price: to_fixed_point("base_price", &raw.base_price)?,
            growth_rate: to_fixed_point("growth_rate", &raw.growth_rate)?,
        })
    }
}

/// Convert a non-negative decimal string to its 18-decimal fixed-point value.
///
/// Accepts digits with an optional fractional part of at most 18 digits, e.g.
/// `"100000000"` or `"0.0001"`. Signs, exponents and separators are rejected.
pub fn to_fixed_point(field: &'static str, value: &str) -> Result<U256, DeployError> {
    let invalid = |reason| DeployError::InvalidAmount {
        field,
        value: value.to_string(),
        reason,
    };

    let (whole, fraction) = match value.split_once('.') {
        Some((_, fraction)) if fraction.is_empty() => {
            return Err(invalid("missing digits after the decimal point"));
        }
        Some(parts) => parts,
        None => (value, ""),
    };
    if whole.is_empty() {
        return Err(invalid("missing integer part"));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected a non-negative decimal number"));
    }
    if fraction.len() > FIXED_POINT_DECIMALS {
        return Err(invalid("more than 18 fractional digits"));
    }

    parse_ether(value).map_err(|_| invalid("does not fit in 256 bits"))
}
