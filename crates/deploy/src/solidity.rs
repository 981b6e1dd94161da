//! Definitions of Solidity functions called during deployment

use alloy_sol_types::sol;

sol! {
    /// `MySocialToken` proxy initializer.
    function initialize(string name, string symbol, address owner) external;

    /// Registers the presale allowed to mint from the token.
    function setPresaleContract(address presale) external;
}
