//! Chain-agnostic HTLC transaction machinery
//!
//! One role state machine ([`Transaction`]) and one signing façade
//! ([`Signature`]) are written against the [`SwapChain`] capability trait;
//! each chain family implements the trait once.

pub mod signature;
pub mod solver;
pub mod transaction;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SwapError};
use crate::units::Unit;

pub use signature::Signature;
pub use solver::{KeySource, Solver};
pub use transaction::{
    submit_transaction_raw, FundTransaction, RefundTransaction, Transaction, WithdrawTransaction,
};

// ============================================================================
// ROLES AND CHAINS
// ============================================================================

/// HTLC transaction role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Fund,
    Withdraw,
    Refund,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Fund => "fund",
            Role::Withdraw => "withdraw",
            Role::Refund => "refund",
        }
    }

    /// Name of the solver type that may sign this role
    pub fn solver_name(&self) -> &'static str {
        match self {
            Role::Fund => "FundSolver",
            Role::Withdraw => "WithdrawSolver",
            Role::Refund => "RefundSolver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain a transaction belongs to, as written in transaction type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    Bitcoin,
    Ethereum,
    XinFin,
    Vapor,
}

impl ChainKind {
    pub const ALL: [ChainKind; 4] = [
        ChainKind::Bitcoin,
        ChainKind::Ethereum,
        ChainKind::XinFin,
        ChainKind::Vapor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Bitcoin => "bitcoin",
            ChainKind::Ethereum => "ethereum",
            ChainKind::XinFin => "xinfin",
            ChainKind::Vapor => "vapor",
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainKind {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        ChainKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SwapError::Value(format!("unknown chain '{}'", s)))
    }
}

/// Transaction type tag: `<chain>_<role>_<unsigned|signed>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionType {
    pub chain: ChainKind,
    pub role: Role,
    pub signed: bool,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.signed { "signed" } else { "unsigned" };
        write!(f, "{}_{}_{}", self.chain, self.role, state)
    }
}

impl FromStr for TransactionType {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        let unsupported = || SwapError::UnsupportedTransactionType(s.to_string());
        let mut parts = s.split('_');
        let (Some(chain), Some(role), Some(state), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(unsupported());
        };
        let chain = chain.parse::<ChainKind>().map_err(|_| unsupported())?;
        let role = match role {
            "fund" => Role::Fund,
            "withdraw" => Role::Withdraw,
            "refund" => Role::Refund,
            _ => return Err(unsupported()),
        };
        let signed = match state {
            "signed" => true,
            "unsigned" => false,
            _ => return Err(unsupported()),
        };
        Ok(TransactionType { chain, role, signed })
    }
}

// ============================================================================
// CHAIN CAPABILITY
// ============================================================================

/// Funding transaction reference and role inputs for withdraw/refund builds
#[derive(Debug, Clone, Copy)]
pub struct Spend<'a, H> {
    /// Hash of the transaction that funded the HTLC
    pub transaction_hash: &'a str,
    /// Address receiving the HTLC value (recipient on withdraw, sender on refund)
    pub address: &'a str,
    /// Withdraw secret preimage
    pub secret: Option<&'a str>,
    /// Explicit HTLC descriptor, otherwise resolved from the funding transaction
    pub htlc: Option<&'a H>,
}

/// What a chain family must provide for the generic role state machine.
///
/// A build is `prepare_*` → `estimate_fee` → `assemble`, awaited in that order
/// on one draft; the draft is the snapshot of remote state (nonce and gas price,
/// UTXO set, server-built transaction) both later steps work from.
#[async_trait(?Send)]
pub trait SwapChain: Clone {
    /// HTLC descriptor
    type Htlc;
    /// Amount in the smallest unit
    type Amount: Copy + fmt::Display;
    /// Unassembled transaction
    type Draft;
    /// Chain-native unsigned transaction
    type Transaction: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq;
    /// Chain-native signature object
    type Signature: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq;
    /// Signing context produced by a solver
    type Keys;

    fn kind(&self) -> ChainKind;
    fn network(&self) -> &str;
    fn units(&self) -> &'static [Unit];

    /// Selects inputs / encodes the fund call for `amount` locked into `htlc`.
    async fn prepare_fund(
        &self,
        address: &str,
        htlc: &Self::Htlc,
        amount: Self::Amount,
    ) -> Result<Self::Draft>;

    /// Resolves the locked contract from the funding transaction.
    async fn prepare_spend(&self, role: Role, spend: Spend<'_, Self::Htlc>) -> Result<Self::Draft>;

    /// Estimates the fee in the smallest unit, recording the estimate on the draft.
    async fn estimate_fee(&self, draft: &mut Self::Draft) -> Result<u64>;

    fn assemble(&self, draft: Self::Draft, fee: u64) -> Result<Self::Transaction>;

    fn sign_transaction(
        &self,
        role: Role,
        transaction: &Self::Transaction,
        keys: &Self::Keys,
    ) -> Result<Self::Signature>;

    fn transaction_hash(
        &self,
        transaction: &Self::Transaction,
        signature: Option<&Self::Signature>,
    ) -> Result<String>;

    fn raw_transaction(
        &self,
        transaction: &Self::Transaction,
        signature: Option<&Self::Signature>,
    ) -> Result<String>;

    /// Submits a signed transaction, returning its id.
    async fn submit(
        &self,
        transaction: &Self::Transaction,
        signature: &Self::Signature,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_round_trip() {
        let tag: TransactionType = "xinfin_withdraw_signed".parse().unwrap();
        assert_eq!(tag.chain, ChainKind::XinFin);
        assert_eq!(tag.role, Role::Withdraw);
        assert!(tag.signed);
        assert_eq!(tag.to_string(), "xinfin_withdraw_signed");
    }

    #[test]
    fn test_transaction_type_unsupported() {
        for tag in ["bytom_fund_unsigned", "vapor_claim_signed", "vapor_fund", "vapor_fund_signed_x"] {
            assert!(matches!(
                tag.parse::<TransactionType>(),
                Err(SwapError::UnsupportedTransactionType(_))
            ));
        }
    }
}
