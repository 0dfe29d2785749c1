//! Bitcoin solvers
//!
//! Spend solvers carry the HTLC witness script, and the withdraw solver the
//! secret, since both go into the input witness.

use bitcoin::ScriptBuf;

use super::{Bitcoin, BitcoinKeys};
use crate::core::{KeySource, Role, Solver};
use crate::error::{Result, SwapError};
use crate::wallet::Bip32Wallet;

fn derive(key: &KeySource, chain: &Bitcoin) -> Result<BitcoinKeys> {
    let wallet = Bip32Wallet::from_xprivate_key(key.xprivate_key())?
        .from_path(&key.path(chain.bip44_template()))?;
    Ok(BitcoinKeys::from_wallet(&wallet))
}

fn parse_bytecode(bytecode: &str) -> Result<ScriptBuf> {
    hex::decode(bytecode)
        .map(ScriptBuf::from_bytes)
        .map_err(|_| SwapError::Value("HTLC bytecode is not hex".to_string()))
}

/// Signs the P2WPKH inputs of a fund transaction
#[derive(Debug, Clone)]
pub struct FundSolver {
    key: KeySource,
}

impl FundSolver {
    pub fn new(xprivate_key: &str) -> Self {
        Self {
            key: KeySource::new(xprivate_key),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.key = self.key.with_path(path);
        self
    }

    pub fn with_indexes(mut self, account: u32, change: bool, address: u32) -> Self {
        self.key = self.key.with_indexes(account, change, address);
        self
    }
}

impl Solver<Bitcoin> for FundSolver {
    fn role(&self) -> Role {
        Role::Fund
    }

    fn solve(&self, chain: &Bitcoin) -> Result<BitcoinKeys> {
        derive(&self.key, chain)
    }
}

/// Signs the HTLC input of a withdraw with the recipient key and the secret
#[derive(Clone)]
pub struct WithdrawSolver {
    key: KeySource,
    secret: String,
    bytecode: String,
}

impl WithdrawSolver {
    pub fn new(xprivate_key: &str, secret: &str, bytecode: &str) -> Self {
        Self {
            key: KeySource::new(xprivate_key),
            secret: secret.to_string(),
            bytecode: bytecode.to_string(),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.key = self.key.with_path(path);
        self
    }

    pub fn with_indexes(mut self, account: u32, change: bool, address: u32) -> Self {
        self.key = self.key.with_indexes(account, change, address);
        self
    }
}

impl std::fmt::Debug for WithdrawSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithdrawSolver")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("bytecode", &self.bytecode)
            .finish()
    }
}

impl Solver<Bitcoin> for WithdrawSolver {
    fn role(&self) -> Role {
        Role::Withdraw
    }

    fn solve(&self, chain: &Bitcoin) -> Result<BitcoinKeys> {
        Ok(BitcoinKeys {
            witness_script: Some(parse_bytecode(&self.bytecode)?),
            secret: Some(self.secret.clone()),
            ..derive(&self.key, chain)?
        })
    }
}

/// Signs the HTLC input of a refund with the sender key
#[derive(Debug, Clone)]
pub struct RefundSolver {
    key: KeySource,
    bytecode: String,
}

impl RefundSolver {
    pub fn new(xprivate_key: &str, bytecode: &str) -> Self {
        Self {
            key: KeySource::new(xprivate_key),
            bytecode: bytecode.to_string(),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.key = self.key.with_path(path);
        self
    }

    pub fn with_indexes(mut self, account: u32, change: bool, address: u32) -> Self {
        self.key = self.key.with_indexes(account, change, address);
        self
    }
}

impl Solver<Bitcoin> for RefundSolver {
    fn role(&self) -> Role {
        Role::Refund
    }

    fn solve(&self, chain: &Bitcoin) -> Result<BitcoinKeys> {
        Ok(BitcoinKeys {
            witness_script: Some(parse_bytecode(&self.bytecode)?),
            ..derive(&self.key, chain)?
        })
    }
}
