//! Vapor wallet: BIP39 seed, chainkd root and one derived key

use super::chainkd::{parse_path, XPrv};
use super::utils::{is_network, public_key_address};
use super::VAPOR_BIP44;
use crate::error::{Result, SwapError};
use crate::wallet::seed_from_mnemonic;

#[derive(Debug, Clone)]
pub struct VaporWallet {
    network: String,
    root: XPrv,
    derived: Option<(String, XPrv)>,
}

impl VaporWallet {
    pub fn from_mnemonic(mnemonic: &str, passphrase: &str, network: &str) -> Result<Self> {
        let seed = seed_from_mnemonic(mnemonic, passphrase)?;
        Self::from_root(XPrv::root(&seed), network)
    }

    pub fn from_xprivate_key(xprivate_key: &str, network: &str) -> Result<Self> {
        Self::from_root(XPrv::from_hex(xprivate_key)?, network)
    }

    fn from_root(root: XPrv, network: &str) -> Result<Self> {
        if !is_network(network) {
            return Err(SwapError::Network(format!("unknown vapor network '{}'", network)));
        }
        Ok(Self {
            network: network.to_string(),
            root,
            derived: None,
        })
    }

    /// Derives the signing key at a non-hardened `path`.
    pub fn from_path(mut self, path: &str) -> Result<Self> {
        let derived = self.root.derive(&parse_path(path)?);
        self.derived = Some((path.to_string(), derived));
        Ok(self)
    }

    /// Derives the key at `m/44/153/{account}/{change}/{address}`.
    pub fn from_indexes(self, account: u32, change: bool, address: u32) -> Result<Self> {
        let path = VAPOR_BIP44
            .replace("{account}", &account.to_string())
            .replace("{change}", if change { "1" } else { "0" })
            .replace("{address}", &address.to_string());
        self.from_path(&path)
    }

    fn key(&self) -> &XPrv {
        match &self.derived {
            Some((_, key)) => key,
            None => &self.root,
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn xprivate_key(&self) -> String {
        self.root.to_hex()
    }

    pub fn xpublic_key(&self) -> String {
        self.root.xpub().to_hex()
    }

    pub fn path(&self) -> Option<&str> {
        self.derived.as_ref().map(|(path, _)| path.as_str())
    }

    /// Extended private key of the signing key
    pub fn private_key(&self) -> String {
        self.key().to_hex()
    }

    pub fn public_key(&self) -> String {
        hex::encode(self.key().public_key())
    }

    pub fn address(&self) -> Result<String> {
        public_key_address(&self.key().public_key(), &self.network)
    }
}
