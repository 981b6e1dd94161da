//! Deployment context shared by every step of a run.

use alloy_core::primitives::Address;

/// Values known before the run starts that are not derived parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    /// Owner handed to the token initializer (the deployer account).
    pub owner: Address,
    /// Pre-existing stable asset accepted by the presale.
    pub stable_asset: Address,
    /// ERC-20 name of the token.
    pub token_name: String,
    /// ERC-20 symbol of the token.
    pub token_symbol: String,
}
