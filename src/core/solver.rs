//! Solver abstraction
//!
//! A solver knows which role it may sign and how to turn its key material into
//! the signing context of one chain family.

use crate::core::{Role, SwapChain};
use crate::error::Result;

/// Produces signing keys for transactions of a single role.
pub trait Solver<C: SwapChain> {
    fn role(&self) -> Role;

    /// Derives a fresh signing context. Pure: no I/O, no cached state.
    fn solve(&self, chain: &C) -> Result<C::Keys>;
}

/// Extended private key plus where to derive the signing key from it.
///
/// The key is derived at `path` when one is set, otherwise at the chain's
/// BIP44 template filled with `(account, change, address)`.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySource {
    xprivate_key: String,
    path: Option<String>,
    account: u32,
    change: bool,
    address: u32,
}

impl KeySource {
    pub fn new(xprivate_key: &str) -> Self {
        Self {
            xprivate_key: xprivate_key.to_string(),
            path: None,
            account: 0,
            change: false,
            address: 0,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_indexes(mut self, account: u32, change: bool, address: u32) -> Self {
        self.account = account;
        self.change = change;
        self.address = address;
        self
    }

    pub fn xprivate_key(&self) -> &str {
        &self.xprivate_key
    }

    /// Resolves the derivation path against a template such as
    /// `m/44'/60'/{account}'/{change}/{address}`.
    pub fn path(&self, template: &str) -> String {
        match &self.path {
            Some(path) => path.clone(),
            None => template
                .replace("{account}", &self.account.to_string())
                .replace("{change}", if self.change { "1" } else { "0" })
                .replace("{address}", &self.address.to_string()),
        }
    }
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySource")
            .field("xprivate_key", &"<redacted>")
            .field("path", &self.path)
            .field("account", &self.account)
            .field("change", &self.change)
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_from_indexes() {
        let source = KeySource::new("xprv").with_indexes(1, false, 1);
        assert_eq!(source.path("m/44/153/{account}/{change}/{address}"), "m/44/153/1/0/1");
        let source = KeySource::new("xprv").with_indexes(0, true, 7);
        assert_eq!(source.path("m/44'/60'/{account}'/{change}/{address}"), "m/44'/60'/0'/1/7");
    }

    #[test]
    fn test_default_path() {
        let source = KeySource::new("");
        assert_eq!(source.path("m/44'/550'/{account}'/{change}/{address}"), "m/44'/550'/0'/0/0");
    }

    #[test]
    fn test_explicit_path_wins() {
        let source = KeySource::new("xprv").with_indexes(3, true, 3).with_path("m/0/1");
        assert_eq!(source.path("m/44'/0'/{account}'/{change}/{address}"), "m/0/1");
    }

    #[test]
    fn test_debug_redacts_key() {
        let source = KeySource::new("xprv-secret");
        assert!(!format!("{:?}", source).contains("xprv-secret"));
    }
}
