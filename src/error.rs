//! Error types

use chain_clients_common::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Invalid network: {0}")]
    Network(String),

    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Invalid unit: {0}")]
    Unit(String),

    /// Wrong solver role or wrong descriptor kind
    #[error("Invalid type: expected {expected}, got {actual}")]
    Type { expected: String, actual: String },

    #[error("Transaction is none, build transaction first")]
    NotBuilt,

    #[error("Transaction is already signed")]
    AlreadySigned,

    #[error("Invalid value: {0}")]
    Value(String),

    #[error("Insufficient balance: {0}")]
    Balance(String),

    #[error("invalid transaction raw")]
    InvalidTransactionRaw,

    #[error("unsupported transaction type: {0}")]
    UnsupportedTransactionType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The node or service received the request and rejected it
    #[error("API error: {reason}")]
    Api { reason: String, code: Option<i64> },

    /// Transport, decoding or estimation failure below the API layer
    #[error(transparent)]
    Provider(anyhow::Error),
}

impl SwapError {
    pub fn wrong_solver(expected: &str, actual: &str) -> Self {
        SwapError::Type {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<anyhow::Error> for SwapError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<ApiError>() {
            Some(api_error) => SwapError::Api {
                reason: api_error.reason.clone(),
                code: api_error.code,
            },
            None => SwapError::Provider(error),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;
