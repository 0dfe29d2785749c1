//! Shared key derivation glue
//!
//! BIP39 mnemonics to seeds and BIP32 derivation for the secp256k1 families.
//! Vapor uses its own ed25519 scheme in [`crate::vapor::chainkd`].

use bip39::{Language, Mnemonic};
use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::NetworkKind;
use std::str::FromStr;

use crate::error::{Result, SwapError};

/// BIP39 seed of an English mnemonic
pub fn seed_from_mnemonic(mnemonic: &str, passphrase: &str) -> Result<[u8; 64]> {
    let mnemonic = Mnemonic::parse_in(Language::English, mnemonic)
        .map_err(|e| SwapError::Value(format!("invalid mnemonic: {}", e)))?;
    Ok(mnemonic.to_seed(passphrase))
}

/// BIP32 wallet: a root extended key and an optional derived key
#[derive(Clone)]
pub struct Bip32Wallet {
    secp: Secp256k1<All>,
    root: Xpriv,
    derived: Option<(String, Xpriv)>,
}

impl Bip32Wallet {
    pub fn from_seed(seed: &[u8], network: NetworkKind) -> Result<Self> {
        let root = Xpriv::new_master(network, seed)
            .map_err(|e| SwapError::Value(format!("invalid seed: {}", e)))?;
        Ok(Self {
            secp: Secp256k1::new(),
            root,
            derived: None,
        })
    }

    pub fn from_mnemonic(mnemonic: &str, passphrase: &str, network: NetworkKind) -> Result<Self> {
        Self::from_seed(&seed_from_mnemonic(mnemonic, passphrase)?, network)
    }

    pub fn from_xprivate_key(xprivate_key: &str) -> Result<Self> {
        let root = Xpriv::from_str(xprivate_key)
            .map_err(|e| SwapError::Value(format!("invalid xprivate key: {}", e)))?;
        Ok(Self {
            secp: Secp256k1::new(),
            root,
            derived: None,
        })
    }

    /// Derives the signing key at `path` from the root key.
    pub fn from_path(mut self, path: &str) -> Result<Self> {
        let derivation = DerivationPath::from_str(path)
            .map_err(|e| SwapError::Value(format!("invalid derivation path '{}': {}", path, e)))?;
        let derived = self
            .root
            .derive_priv(&self.secp, &derivation)
            .map_err(|e| SwapError::Value(format!("derivation failed for '{}': {}", path, e)))?;
        self.derived = Some((path.to_string(), derived));
        Ok(self)
    }

    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    pub fn xprivate_key(&self) -> String {
        self.root.to_string()
    }

    pub fn xpublic_key(&self) -> String {
        Xpub::from_priv(&self.secp, &self.root).to_string()
    }

    pub fn path(&self) -> Option<&str> {
        self.derived.as_ref().map(|(path, _)| path.as_str())
    }

    /// Signing key: the derived key, or the root key when no path was applied
    pub fn secret_key(&self) -> bitcoin::secp256k1::SecretKey {
        match &self.derived {
            Some((_, derived)) => derived.private_key,
            None => self.root.private_key,
        }
    }

    /// Signing key in hex
    pub fn private_key(&self) -> String {
        hex::encode(self.secret_key().secret_bytes())
    }

    pub fn public_key(&self) -> bitcoin::secp256k1::PublicKey {
        bitcoin::secp256k1::PublicKey::from_secret_key(&self.secp, &self.secret_key())
    }
}
