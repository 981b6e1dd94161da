//! Chain-interaction service consumed by the orchestrator.
//!
//! The orchestrator only sees the [`ChainClient`] trait. [`RpcChainClient`] is the
//! production implementation talking to an Ethereum JSON-RPC endpoint with
//! contract bytecode read from a Hardhat artifacts directory.

mod contracts;
mod rpc;

use std::{collections::BTreeMap, future::Future};

use alloy_core::primitives::{Address, Bytes, TxHash};
use alloy_sol_types::SolCall;
use anyhow::Result;

pub use contracts::{ContractRepository, ERC1967_PROXY};
pub use rpc::{RpcChainClient, create_client, json_rpc_call};

/// Library contract name → deployed library address.
pub type LinkedLibraries = BTreeMap<String, Address>;

/// ABI-encoded call together with the signature it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    /// Solidity signature, e.g. `setPresaleContract(address)`.
    pub signature: &'static str,
    /// Selector followed by the encoded arguments.
    pub calldata: Bytes,
}

impl EncodedCall {
    pub fn new<C: SolCall>(call: &C) -> Self {
        Self {
            signature: C::SIGNATURE,
            calldata: call.abi_encode().into(),
        }
    }
}

/// Outcome of a plain contract deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub tx_hash: TxHash,
}

/// Outcome of an upgradeable (proxy) deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// Address callers interact with.
    pub proxy: Address,
    /// Address of the logic contract behind the proxy.
    pub implementation: Address,
    /// Hash of the proxy deployment transaction.
    pub tx_hash: TxHash,
    /// Hash of the implementation deployment transaction.
    pub implementation_tx_hash: TxHash,
}

/// External service performing deployments and calls.
///
/// Every operation is a single blocking outcome from the caller's point of view:
/// the returned future resolves once the transaction is final or has failed.
/// Timeouts are the implementation's concern.
pub trait ChainClient: Send + Sync {
    /// Account sending every transaction.
    fn sender(&self) -> Address;

    /// Deploy `contract` with the given encoded constructor arguments.
    fn deploy(
        &self,
        contract: &str,
        constructor_args: Bytes,
        libraries: &LinkedLibraries,
    ) -> impl Future<Output = Result<Deployment>> + Send;

    /// Deploy `contract` behind an upgradeable proxy, running `init` through the
    /// proxy at construction.
    fn deploy_proxy(
        &self,
        contract: &str,
        init: EncodedCall,
        libraries: &LinkedLibraries,
    ) -> impl Future<Output = Result<ProxyDeployment>> + Send;

    /// Send `call` to the contract at `target`.
    fn call(&self, target: Address, call: EncodedCall) -> impl Future<Output = Result<TxHash>> + Send;
}
