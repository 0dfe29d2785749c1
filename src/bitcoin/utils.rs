//! Bitcoin network and address helpers

use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::{Address, Network};
use std::str::FromStr;

use crate::error::{Result, SwapError};

pub const NETWORKS: [&str; 3] = ["mainnet", "testnet", "regtest"];

pub fn is_network(network: &str) -> bool {
    NETWORKS.contains(&network)
}

/// Maps a configured network name to the rust-bitcoin network
pub fn to_network(network: &str) -> Result<Network> {
    match network {
        "mainnet" => Ok(Network::Bitcoin),
        "testnet" => Ok(Network::Testnet),
        "regtest" => Ok(Network::Regtest),
        other => Err(SwapError::Network(format!("unknown bitcoin network '{}'", other))),
    }
}

/// Checks an address, optionally against a network. Never fails.
pub fn is_address(address: &str, network: Option<&str>) -> bool {
    let Ok(unchecked) = Address::<NetworkUnchecked>::from_str(address) else {
        return false;
    };
    match network {
        Some(name) => to_network(name)
            .map(|network| unchecked.is_valid_for_network(network))
            .unwrap_or(false),
        None => true,
    }
}

pub(crate) fn parse_address(address: &str, network: Network) -> Result<Address> {
    Address::<NetworkUnchecked>::from_str(address)
        .map_err(|e| SwapError::Address(format!("invalid bitcoin address '{}': {}", address, e)))?
        .require_network(network)
        .map_err(|_| {
            SwapError::Address(format!("address '{}' is not a {} address", address, network))
        })
}

/// Public key hash paid by a P2WPKH or P2PKH address
pub(crate) fn pubkey_hash(address: &Address) -> Result<[u8; 20]> {
    let script = address.script_pubkey();
    let bytes = script.as_bytes();
    let hash = if script.is_p2wpkh() {
        &bytes[2..22]
    } else if script.is_p2pkh() {
        &bytes[3..23]
    } else {
        return Err(SwapError::Address(format!(
            "'{}' is not a P2WPKH or P2PKH address",
            address
        )));
    };
    let mut out = [0u8; 20];
    out.copy_from_slice(hash);
    Ok(out)
}

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    sha256::Hash::hash(data).to_byte_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_network() {
        assert!(is_network("mainnet"));
        assert!(is_network("regtest"));
        assert!(!is_network("unknown"));
    }

    #[test]
    fn test_is_address() {
        let address = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
        assert!(is_address(address, None));
        assert!(is_address(address, Some("mainnet")));
        assert!(!is_address(address, Some("testnet")));
        assert!(!is_address(address, Some("unknown")));
        assert!(!is_address("bad-string", None));
    }

    #[test]
    fn test_pubkey_hash_p2wpkh() {
        let address = parse_address("bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu", Network::Bitcoin)
            .unwrap();
        assert_eq!(
            hex::encode(pubkey_hash(&address).unwrap()),
            "c0cebcd6c3d3ca8c75dc5ec62ebe55330ef910e2"
        );
    }
}
