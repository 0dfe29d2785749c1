//! HTLC atomic swap transactions
//!
//! Builds, signs and serializes the fund, withdraw and refund transactions of
//! hash time lock contracts on Bitcoin, EVM chains (Ethereum, XinFin) and Vapor.

pub mod bitcoin;
pub mod config;
pub mod core;
pub mod error;
pub mod evm;
pub mod raw;
pub mod units;
pub mod vapor;
pub mod wallet;

// Re-export public types for convenience
pub use crate::bitcoin::{Bitcoin, BitcoinHtlc};
pub use crate::config::{BitcoinConfig, EvmConfig, SwapConfig, VaporConfig};
pub use crate::core::{
    submit_transaction_raw, ChainKind, FundTransaction, KeySource, RefundTransaction, Role,
    Signature, Solver, SwapChain, Transaction, TransactionType, WithdrawTransaction,
};
pub use crate::error::{Result, SwapError};
pub use crate::evm::{Evm, EvmHtlc};
pub use crate::raw::{decode_transaction_raw, is_transaction_raw, TransactionRaw};
pub use crate::units::amount_unit_converter;
pub use crate::vapor::{Vapor, VaporHtlc, VaporWallet};
pub use crate::wallet::Bip32Wallet;
