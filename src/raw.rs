//! Portable transaction raw encoding
//!
//! A transaction raw is the canonical JSON object
//! `{"fee", "transaction", "signature", "network", "type"}` encoded as URL-safe
//! base64 without padding. Decoding accepts padded and unpadded input.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{ChainKind, TransactionType};
use crate::error::{Result, SwapError};

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded transaction raw for one chain family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRaw<T, S> {
    pub fee: u64,
    pub transaction: T,
    pub signature: Option<S>,
    pub network: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl<T: Serialize, S: Serialize> TransactionRaw<T, S> {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(|e| SwapError::Provider(e.into()))?;
        Ok(ENGINE.encode(json))
    }
}

impl<T: DeserializeOwned, S: DeserializeOwned> TransactionRaw<T, S> {
    /// Decodes a raw of chain family `chain` into typed chain objects.
    ///
    /// Fails with `UnsupportedTransactionType` when the type tag is unknown or
    /// names another family, `InvalidTransactionRaw` when the blob is not
    /// base64 JSON of the expected shape.
    pub fn decode(transaction_raw: &str, chain: ChainKind) -> Result<(Self, TransactionType)> {
        let value = decode_value(transaction_raw)?;
        let tag = type_tag(&value)?;
        if tag.chain != chain {
            return Err(SwapError::UnsupportedTransactionType(format!(
                "{} (expected a {} transaction)",
                tag, chain
            )));
        }
        let raw: Self =
            serde_json::from_value(value).map_err(|_| SwapError::InvalidTransactionRaw)?;
        Ok((raw, tag))
    }
}

fn decode_value(transaction_raw: &str) -> Result<serde_json::Value> {
    let bytes = ENGINE
        .decode(transaction_raw.trim())
        .map_err(|_| SwapError::InvalidTransactionRaw)?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| SwapError::InvalidTransactionRaw)?;
    let object = value.as_object().ok_or(SwapError::InvalidTransactionRaw)?;
    for key in ["fee", "transaction", "signature", "network", "type"] {
        if !object.contains_key(key) {
            return Err(SwapError::InvalidTransactionRaw);
        }
    }
    Ok(value)
}

fn type_tag(value: &serde_json::Value) -> Result<TransactionType> {
    value["type"]
        .as_str()
        .ok_or(SwapError::InvalidTransactionRaw)?
        .parse()
}

/// Decodes any family's raw into `{fee, transaction, signature, network, type}`.
pub fn decode_transaction_raw(transaction_raw: &str) -> Result<serde_json::Value> {
    let value = decode_value(transaction_raw)?;
    type_tag(&value)?;
    Ok(value)
}

/// Returns true if `transaction_raw` decodes to a known transaction type.
pub fn is_transaction_raw(transaction_raw: &str) -> bool {
    decode_transaction_raw(transaction_raw).is_ok()
}
