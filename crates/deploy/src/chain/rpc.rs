//! [`ChainClient`] over an Ethereum JSON-RPC endpoint with local signing.

use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_core::primitives::{Address, Bytes, TxHash, TxKind, U64, U128, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolValue;
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use url::Url;

use super::{
    ChainClient, ContractRepository, Deployment, ERC1967_PROXY, EncodedCall, LinkedLibraries,
    ProxyDeployment,
};
use crate::DeployConfig;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between two receipt lookups.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Gas estimates are scaled by `GAS_MARGIN_PERCENT / 100`.
const GAS_MARGIN_PERCENT: u64 = 120;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    tracing::trace!(method, ?params, "Sending JSON-RPC request");

    let response = client
        .post(url)
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error from {}: {}",
            method,
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: TxHash,
    /// `0x1` on success, `0x0` on revert.
    status: Option<U64>,
    contract_address: Option<Address>,
    gas_used: U64,
    block_number: Option<U64>,
}

impl TransactionReceipt {
    fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status != U64::ZERO)
    }
}

/// Production chain client.
///
/// Every transaction is an EIP-1559 transaction signed with the configured key
/// and sent through `eth_sendRawTransaction`. Calls return once the receipt is
/// available and successful.
pub struct RpcChainClient {
    client: reqwest::Client,
    url: Url,
    signer: PrivateKeySigner,
    chain_id: u64,
    contracts: ContractRepository,
    receipt_timeout: Duration,
}

impl RpcChainClient {
    /// Connect to the configured endpoint and check the chain it serves.
    pub async fn connect(
        config: &DeployConfig,
        contracts: ContractRepository,
    ) -> Result<Self, anyhow::Error> {
        if config.private_key.is_empty() {
            anyhow::bail!("No deployer private key configured (set MYSO_PRIVATE_KEY)");
        }
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .context("Failed to parse deployer private key")?;

        let client = create_client()?;
        let reported: U64 =
            json_rpc_call(&client, config.rpc_url.as_str(), "eth_chainId", vec![]).await?;
        let chain_id = reported.to::<u64>();

        if let Some(expected) = config.chain_id {
            if expected != chain_id {
                anyhow::bail!(
                    "RPC endpoint {} serves chain {} but chain {} is configured",
                    config.rpc_url,
                    chain_id,
                    expected
                );
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id,
            deployer = %signer.address(),
            "Connected to chain"
        );

        Ok(Self {
            client,
            url: config.rpc_url.clone(),
            signer,
            chain_id,
            contracts,
            receipt_timeout: config.receipt_timeout(),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contracts(&self) -> &ContractRepository {
        &self.contracts
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> anyhow::Result<T> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    /// Sign and send a transaction, then wait for its successful receipt.
    async fn transact(&self, to: TxKind, input: Bytes) -> anyhow::Result<TransactionReceipt> {
        let from = self.signer.address();

        let nonce: U64 = self
            .rpc("eth_getTransactionCount", vec![json!(from), json!("pending")])
            .await?;
        let gas_price: U128 = self.rpc("eth_gasPrice", vec![]).await?;
        let priority_fee: U128 = self.rpc("eth_maxPriorityFeePerGas", vec![]).await?;

        let mut request = json!({ "from": from, "data": input });
        if let TxKind::Call(target) = to {
            request["to"] = json!(target);
        }
        let estimate: U64 = self
            .rpc("eth_estimateGas", vec![request])
            .await
            .context("Gas estimation failed (the transaction would likely revert)")?;

        let gas_price = gas_price.to::<u128>();
        let max_priority_fee_per_gas = priority_fee.to::<u128>();
        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: nonce.to::<u64>(),
            gas_limit: estimate.to::<u64>().saturating_mul(GAS_MARGIN_PERCENT) / 100,
            max_fee_per_gas: gas_price.saturating_mul(2).saturating_add(max_priority_fee_per_gas),
            max_priority_fee_per_gas,
            to,
            value: U256::ZERO,
            input,
            ..Default::default()
        };

        let signature = self
            .signer
            .sign_hash_sync(&tx.signature_hash())
            .context("Failed to sign transaction")?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        let raw = envelope.encoded_2718();

        let tx_hash: TxHash = self
            .rpc(
                "eth_sendRawTransaction",
                vec![json!(format!("0x{}", hex::encode(raw)))],
            )
            .await?;
        tracing::debug!(%tx_hash, nonce = nonce.to::<u64>(), "Transaction sent");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            anyhow::bail!("Transaction {} reverted", tx_hash);
        }

        tracing::debug!(
            %tx_hash,
            block = ?receipt.block_number.map(|block| block.to::<u64>()),
            gas_used = receipt.gas_used.to::<u64>(),
            "Transaction mined"
        );

        Ok(receipt)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> anyhow::Result<TransactionReceipt> {
        let attempts = (self.receipt_timeout.as_secs() / RECEIPT_POLL_INTERVAL.as_secs()).max(1);

        let fetch = || async {
            let receipt: Option<TransactionReceipt> = self
                .rpc("eth_getTransactionReceipt", vec![json!(tx_hash)])
                .await?;
            receipt.context("Receipt not yet available")
        };

        fetch
            .retry(
                ConstantBuilder::default()
                    .with_delay(RECEIPT_POLL_INTERVAL)
                    .with_max_times(attempts as usize),
            )
            .notify(|err, _| {
                tracing::trace!(error = %err, %tx_hash, "Waiting for receipt...");
            })
            .await
            .with_context(|| {
                format!(
                    "Timeout waiting for receipt of {} after {}s",
                    tx_hash,
                    self.receipt_timeout.as_secs()
                )
            })
    }

    async fn create(&self, contract: &str, input: Bytes) -> anyhow::Result<Deployment> {
        let receipt = self
            .transact(TxKind::Create, input)
            .await
            .with_context(|| format!("Failed to deploy {}", contract))?;

        let address = receipt
            .contract_address
            .with_context(|| format!("Receipt for {} has no contract address", contract))?;

        Ok(Deployment {
            address,
            tx_hash: receipt.transaction_hash,
        })
    }
}

impl ChainClient for RpcChainClient {
    fn sender(&self) -> Address {
        self.signer.address()
    }

    async fn deploy(
        &self,
        contract: &str,
        constructor_args: Bytes,
        libraries: &LinkedLibraries,
    ) -> anyhow::Result<Deployment> {
        let bytecode = self.contracts.linked_bytecode(contract, libraries)?;
        let input: Bytes = [&bytecode[..], &constructor_args[..]].concat().into();

        self.create(contract, input).await
    }

    async fn deploy_proxy(
        &self,
        contract: &str,
        init: EncodedCall,
        libraries: &LinkedLibraries,
    ) -> anyhow::Result<ProxyDeployment> {
        let implementation = self.deploy(contract, Bytes::new(), libraries).await?;
        tracing::debug!(
            contract,
            implementation = %implementation.address,
            initializer = init.signature,
            "Implementation deployed, deploying proxy"
        );

        let proxy_code = self
            .contracts
            .linked_bytecode(ERC1967_PROXY, &LinkedLibraries::new())?;
        let proxy_args = (implementation.address, init.calldata).abi_encode_params();
        let input: Bytes = [&proxy_code[..], &proxy_args[..]].concat().into();

        let proxy = self.create(ERC1967_PROXY, input).await?;

        Ok(ProxyDeployment {
            proxy: proxy.address,
            implementation: implementation.address,
            tx_hash: proxy.tx_hash,
            implementation_tx_hash: implementation.tx_hash,
        })
    }

    async fn call(&self, target: Address, call: EncodedCall) -> anyhow::Result<TxHash> {
        let receipt = self
            .transact(TxKind::Call(target), call.calldata)
            .await
            .with_context(|| format!("Call {} on {} failed", call.signature, target))?;

        Ok(receipt.transaction_hash)
    }
}
