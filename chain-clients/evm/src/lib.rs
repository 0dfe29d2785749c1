//! EVM JSON-RPC client
//!
//! Thin async client over the JSON-RPC methods the HTLC transaction builders
//! need: account nonce, gas price, gas estimation, receipts and raw
//! transaction submission. Works against any EVM node (Ethereum, XinFin).

use anyhow::{Context, Result};
use chain_clients_common::{parse_hex_quantity, ApiError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// WIRE TYPES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Message call sent to `eth_estimateGas`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CallRequest {
    pub from: String,
    pub to: String,
    /// Hex quantity (`0x...`)
    pub value: String,
    /// Hex calldata (`0x...`)
    pub data: String,
    #[serde(rename = "gasPrice", skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Log entry of a transaction receipt
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Log {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Indexed event parameters, topic 0 is the event signature
    pub topics: Vec<String>,
    /// Non-indexed event parameters
    pub data: String,
}

/// Transaction receipt returned by `eth_getTransactionReceipt`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    /// Set when the transaction deployed a contract
    #[serde(rename = "contractAddress", default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

// ============================================================================
// CLIENT
// ============================================================================

/// Client for an EVM JSON-RPC endpoint
#[derive(Debug, Clone)]
pub struct EvmClient {
    /// HTTP client for JSON-RPC calls
    client: Client,
    /// Base RPC URL
    base_url: String,
}

impl EvmClient {
    /// Creates a new EVM JSON-RPC client
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - JSON-RPC endpoint URL
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create HTTP client
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: rpc_url.to_string(),
        })
    }

    /// Returns the RPC URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one JSON-RPC request and unwraps its result.
    ///
    /// A JSON-RPC `error` object is returned as an [`ApiError`] so callers can
    /// surface the node's rejection reason.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        debug!("EVM RPC {} -> {}", method, self.base_url);

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = response.error {
            return Err(anyhow::Error::new(ApiError::new(
                error.message,
                Some(error.code),
            )));
        }

        Ok(response.result)
    }

    async fn call_quantity(&self, method: &str, params: Vec<serde_json::Value>) -> Result<u128> {
        let hex_value: String = self
            .call(method, params)
            .await?
            .with_context(|| format!("Missing result in {} response", method))?;
        parse_hex_quantity(&hex_value)
            .with_context(|| format!("Invalid quantity '{}' in {} response", hex_value, method))
    }

    /// Gets the number of transactions sent from an address (the next nonce)
    ///
    /// # Arguments
    ///
    /// * `address` - Account address (0x-prefixed)
    pub async fn get_transaction_count(&self, address: &str) -> Result<u64> {
        let nonce = self
            .call_quantity(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("latest")],
            )
            .await?;
        let nonce = u64::try_from(nonce).context("Nonce does not fit in u64")?;
        info!("EVM nonce for {}: {}", address, nonce);
        Ok(nonce)
    }

    /// Gets the node's current gas price in wei
    pub async fn gas_price(&self) -> Result<u128> {
        let gas_price = self.call_quantity("eth_gasPrice", vec![]).await?;
        info!("EVM gas price: {} wei", gas_price);
        Ok(gas_price)
    }

    /// Estimates the gas a message call would use
    ///
    /// # Arguments
    ///
    /// * `call` - Message call (from, to, value, data)
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Estimated gas units
    /// * `Err(anyhow::Error)` - Node rejected the call (e.g. it reverts) or transport failure
    pub async fn estimate_gas(&self, call: &CallRequest) -> Result<u64> {
        let params = vec![serde_json::to_value(call).context("Failed to serialize call")?];
        let gas = self.call_quantity("eth_estimateGas", params).await?;
        let gas = u64::try_from(gas).context("Gas estimate does not fit in u64")?;
        info!("EVM gas estimate for call to {}: {}", call.to, gas);
        Ok(gas)
    }

    /// Gets a transaction receipt, `None` if the transaction is unknown or pending
    pub async fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>> {
        self.call(
            "eth_getTransactionReceipt",
            vec![serde_json::json!(transaction_hash)],
        )
        .await
    }

    /// Submits a signed raw transaction
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Transaction hash reported by the node
    /// * `Err(anyhow::Error)` - Node rejected the transaction ([`ApiError`]) or transport failure
    pub async fn send_raw_transaction(&self, raw_transaction: &str) -> Result<String> {
        let hash: String = self
            .call(
                "eth_sendRawTransaction",
                vec![serde_json::json!(raw_transaction)],
            )
            .await?
            .context("Missing result in eth_sendRawTransaction response")?;
        info!("EVM transaction submitted: {}", hash);
        Ok(hash)
    }
}
