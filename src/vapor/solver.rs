//! Vapor solvers
//!
//! Keys are chainkd extended private keys (128 hex characters). Without an
//! explicit path the signing key is `m/44/153/1/0/1`.

use super::chainkd::{parse_path, XPrv};
use super::{Vapor, VaporKeys};
use crate::core::{KeySource, Role, Solver};
use crate::error::{Result, SwapError};

fn key_source(xprivate_key: &str) -> KeySource {
    KeySource::new(xprivate_key).with_indexes(1, false, 1)
}

fn derive(key: &KeySource, chain: &Vapor) -> Result<VaporKeys> {
    let root = XPrv::from_hex(key.xprivate_key())?;
    let signing = root.derive(&parse_path(&key.path(chain.bip44_template()))?);
    Ok(VaporKeys {
        root,
        key: signing,
        bytecode: None,
        secret: None,
    })
}

fn parse_bytecode(bytecode: &str) -> Result<Vec<u8>> {
    hex::decode(bytecode).map_err(|_| SwapError::Value("HTLC bytecode is not hex".to_string()))
}

/// Signs fund transactions (wallet inputs only)
#[derive(Debug, Clone)]
pub struct FundSolver {
    key: KeySource,
}

impl FundSolver {
    pub fn new(xprivate_key: &str) -> Self {
        Self {
            key: key_source(xprivate_key),
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

impl Solver<Vapor> for FundSolver {
    fn role(&self) -> Role {
        Role::Fund
    }

    fn solve(&self, chain: &Vapor) -> Result<VaporKeys> {
        derive(&self.key, chain)
    }
}

/// Unlocks the HTLC input with the recipient key and the secret
#[derive(Clone)]
pub struct WithdrawSolver {
    key: KeySource,
    secret: String,
    bytecode: String,
}

impl WithdrawSolver {
    pub fn new(xprivate_key: &str, secret: &str, bytecode: &str) -> Self {
        Self {
            key: key_source(xprivate_key),
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

impl Solver<Vapor> for WithdrawSolver {
    fn role(&self) -> Role {
        Role::Withdraw
    }

    fn solve(&self, chain: &Vapor) -> Result<VaporKeys> {
        Ok(VaporKeys {
            bytecode: Some(parse_bytecode(&self.bytecode)?),
            secret: Some(self.secret.clone()),
            ..derive(&self.key, chain)?
        })
    }
}

/// Unlocks the HTLC input with the sender key after the endblock
#[derive(Debug, Clone)]
pub struct RefundSolver {
    key: KeySource,
    bytecode: String,
}

impl RefundSolver {
    pub fn new(xprivate_key: &str, bytecode: &str) -> Self {
        Self {
            key: key_source(xprivate_key),
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

impl Solver<Vapor> for RefundSolver {
    fn role(&self) -> Role {
        Role::Refund
    }

    fn solve(&self, chain: &Vapor) -> Result<VaporKeys> {
        Ok(VaporKeys {
            bytecode: Some(parse_bytecode(&self.bytecode)?),
            ..derive(&self.key, chain)?
        })
    }
}
