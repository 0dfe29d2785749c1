//! Esplora REST client
//!
//! Async client for the subset of the Esplora HTTP API used by the Bitcoin HTLC
//! builders: address UTXOs, raw transactions, fee estimates and broadcast.

use anyhow::{Context, Result};
use chain_clients_common::ApiError;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Confirmation status of a transaction or UTXO
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// Unspent output owned by an address
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    /// Output value in satoshis
    pub value: u64,
    #[serde(default)]
    pub status: TxStatus,
}

/// Client for an Esplora-compatible REST endpoint
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: Client,
    base_url: String,
}

impl EsploraClient {
    /// Creates a new Esplora client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://blockstream.info/api`
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

    async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Esplora GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send GET {}", path))?;
        check_status(response).await
    }

    /// Lists the unspent outputs of an address
    pub async fn get_address_utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        let utxos: Vec<Utxo> = self
            .get(&format!("/address/{}/utxo", address))
            .await?
            .json()
            .await
            .context("Failed to parse address UTXO response")?;
        info!("Esplora: {} UTXOs for {}", utxos.len(), address);
        Ok(utxos)
    }

    /// Gets a transaction's consensus-serialized hex, `None` if unknown
    pub async fn get_transaction_hex(&self, txid: &str) -> Result<Option<String>> {
        let url = format!("{}/tx/{}/hex", self.base_url, txid);
        debug!("Esplora GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send GET transaction hex request")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let hex = check_status(response)
            .await?
            .text()
            .await
            .context("Failed to read transaction hex response")?;
        Ok(Some(hex.trim().to_string()))
    }

    /// Gets fee-rate estimates (sat/vB) keyed by confirmation target in blocks
    pub async fn get_fee_estimates(&self) -> Result<HashMap<String, f64>> {
        self.get("/fee-estimates")
            .await?
            .json()
            .await
            .context("Failed to parse fee estimates response")
    }

    /// Broadcasts a signed transaction
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Transaction id
    /// * `Err(anyhow::Error)` - Node rejected the transaction ([`ApiError`]) or transport failure
    pub async fn broadcast(&self, transaction_hex: &str) -> Result<String> {
        let url = format!("{}/tx", self.base_url);
        let response = self
            .client
            .post(&url)
            .body(transaction_hex.to_string())
            .send()
            .await
            .context("Failed to send broadcast request")?;
        let txid = check_status(response)
            .await?
            .text()
            .await
            .context("Failed to read broadcast response")?;
        info!("Esplora: transaction broadcast {}", txid.trim());
        Ok(txid.trim().to_string())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let reason = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    Err(anyhow::Error::new(ApiError::new(
        reason.trim(),
        Some(i64::from(status.as_u16())),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// 1. Test: Address UTXOs
    /// Verifies that UTXO listings are parsed with value and outpoint.
    #[tokio::test]
    async fn test_get_address_utxos() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/address/bc1qtest/utxo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"txid": "aa", "vout": 1, "value": 5000, "status": {"confirmed": true, "block_height": 10}}
            ])))
            .mount(&mock_server)
            .await;

        let client = EsploraClient::new(&mock_server.uri()).unwrap();
        let utxos = client.get_address_utxos("bc1qtest").await.unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].vout, 1);
        assert_eq!(utxos[0].value, 5000);
        assert!(utxos[0].status.confirmed);
    }

    /// 2. Test: Unknown Transaction
    /// Verifies that a 404 on /tx/{id}/hex maps to None.
    /// Why: Builders turn an unknown funding transaction into a not-found error.
    #[tokio::test]
    async fn test_get_transaction_hex_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Transaction not found"))
            .mount(&mock_server)
            .await;

        let client = EsploraClient::new(&mock_server.uri()).unwrap();
        assert!(client.get_transaction_hex("ff").await.unwrap().is_none());
    }

    /// 3. Test: Broadcast Rejection
    /// Verifies that a rejected broadcast returns an ApiError carrying the node message.
    #[tokio::test]
    async fn test_broadcast_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tx"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "sendrawtransaction RPC error: {\"code\":-26,\"message\":\"non-final\"}",
            ))
            .mount(&mock_server)
            .await;

        let client = EsploraClient::new(&mock_server.uri()).unwrap();
        let err = client.broadcast("00").await.unwrap_err();
        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert!(api_error.reason.contains("non-final"));
        assert_eq!(api_error.code, Some(400));
    }
}
