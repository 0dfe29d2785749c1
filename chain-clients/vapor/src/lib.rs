//! Vapor blockcenter REST client
//!
//! The blockcenter assembles Vapor transactions server-side: callers describe
//! spend and control actions and receive the raw transaction together with the
//! signing instructions (data to sign per input). Signing happens locally and
//! the signatures are submitted back with `submit-payment`.

use anyhow::{Context, Result};
use chain_clients_common::ApiError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct BlockcenterResponse<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

/// Output of a confirmed Vapor transaction
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TransactionOutput {
    pub utxo_id: String,
    /// Control program (hex)
    pub script: String,
    pub address: String,
    pub asset: String,
    pub amount: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Transaction as reported by `get-transaction`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TransactionDetail {
    pub hash: String,
    #[serde(default)]
    pub outputs: Vec<TransactionOutput>,
}

/// What the owner of one input must sign
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SigningInstruction {
    /// Derivation path indexes as little-endian u32 hex strings
    #[serde(default)]
    pub derivation_path: Option<Vec<String>>,
    /// 32-byte hex messages, one signature each
    pub sign_data: Vec<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BuiltTransactionHeader {
    pub hash: String,
}

/// Transaction assembled by `build-advanced-tx`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub tx: BuiltTransactionHeader,
    pub raw_transaction: String,
    pub signing_instructions: Vec<SigningInstruction>,
    pub fee: u64,
}

#[derive(Debug, Deserialize)]
struct SubmittedPayment {
    tx_hash: String,
}

// ============================================================================
// ACTIONS
// ============================================================================

/// Spend `amount` of `asset` from the requesting wallet's balance
pub fn spend_wallet_action(asset: &str, amount: u64) -> serde_json::Value {
    serde_json::json!({"type": "spend_wallet", "asset": asset, "amount": amount})
}

/// Spend one specific UTXO (e.g. an HTLC output)
pub fn spend_utxo_action(utxo_id: &str) -> serde_json::Value {
    serde_json::json!({"type": "spend_utxo", "output_id": utxo_id})
}

/// Pay `amount` of `asset` to an address
pub fn control_address_action(asset: &str, amount: u64, address: &str) -> serde_json::Value {
    serde_json::json!({"type": "control_address", "asset": asset, "amount": amount, "address": address})
}

// ============================================================================
// CLIENT
// ============================================================================

/// Client for the Vapor blockcenter API
#[derive(Debug, Clone)]
pub struct BlockcenterClient {
    client: Client,
    base_url: String,
}

impl BlockcenterClient {
    /// Creates a new blockcenter client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://bcapi.bystack.com/api/v2/vapor`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        address: Option<&str>,
        body: serde_json::Value,
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Blockcenter POST {}", url);

        let mut request = self.client.post(&url).json(&body);
        if let Some(address) = address {
            request = request.query(&[("address", address)]);
        }

        let response: BlockcenterResponse<T> = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", path))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", path))?;

        if response.code != 200 {
            return Err(anyhow::Error::new(ApiError::new(
                response.msg,
                Some(response.code),
            )));
        }
        Ok(response.data)
    }

    /// Gets a transaction by hash, `None` if the blockcenter does not know it
    pub async fn get_transaction(&self, transaction_hash: &str) -> Result<Option<TransactionDetail>> {
        self.post(
            "/merchant/get-transaction",
            None,
            serde_json::json!({"tx_id": transaction_hash}),
        )
        .await
    }

    /// Builds a transaction from spend/control actions on behalf of `address`
    ///
    /// # Arguments
    ///
    /// * `address` - Vapor address paying the fee
    /// * `inputs` - Spend actions
    /// * `outputs` - Control actions
    /// * `fee` - Fee offered, in NEU
    /// * `confirmations` - Minimum confirmations of spent wallet UTXOs
    pub async fn build_transaction(
        &self,
        address: &str,
        inputs: Vec<serde_json::Value>,
        outputs: Vec<serde_json::Value>,
        fee: u64,
        confirmations: u64,
    ) -> Result<BuiltTransaction> {
        let body = serde_json::json!({
            "fee": fee,
            "confirmations": confirmations,
            "inputs": inputs,
            "outputs": outputs,
            "forbid_chain_tx": false
        });
        let built: Vec<BuiltTransaction> = self
            .post("/merchant/build-advanced-tx", Some(address), body)
            .await?
            .context("Missing data in build-advanced-tx response")?;
        let built = built
            .into_iter()
            .next()
            .context("Blockcenter returned no transaction")?;
        info!("Blockcenter built transaction {} (fee {})", built.tx.hash, built.fee);
        Ok(built)
    }

    /// Submits a raw transaction together with its per-input signatures
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Transaction hash
    /// * `Err(anyhow::Error)` - Blockcenter rejected the payment ([`ApiError`]) or transport failure
    pub async fn submit_payment(
        &self,
        address: &str,
        raw_transaction: &str,
        signatures: &[Vec<String>],
    ) -> Result<String> {
        let body = serde_json::json!({
            "raw_transaction": raw_transaction,
            "signatures": signatures
        });
        let submitted: SubmittedPayment = self
            .post("/merchant/submit-payment", Some(address), body)
            .await?
            .context("Missing data in submit-payment response")?;
        info!("Blockcenter submitted transaction {}", submitted.tx_hash);
        Ok(submitted.tx_hash)
    }
}
