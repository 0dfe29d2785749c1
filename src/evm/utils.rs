//! EVM address, network and hashing helpers

use chain_clients_common::strip_0x;
use sha3::{Digest, Keccak256};

use crate::core::ChainKind;
use crate::error::{Result, SwapError};

pub const ETHEREUM_NETWORKS: &[&str] = &["mainnet", "ropsten", "kovan", "rinkeby", "testnet"];
pub const XINFIN_NETWORKS: &[&str] = &["mainnet", "apothem", "testnet"];

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn is_ethereum_network(network: &str) -> bool {
    ETHEREUM_NETWORKS.contains(&network)
}

pub fn is_xinfin_network(network: &str) -> bool {
    XINFIN_NETWORKS.contains(&network)
}

/// Address prefix used when displaying addresses of `kind`
pub fn address_prefix(kind: ChainKind) -> &'static str {
    match kind {
        ChainKind::XinFin => "xdc",
        _ => "0x",
    }
}

fn address_body(address: &str) -> &str {
    address.strip_prefix("xdc").unwrap_or_else(|| strip_0x(address))
}

/// Checks a `0x`/`xdc` address; mixed-case addresses must carry a valid EIP-55 checksum.
pub fn is_address(address: &str) -> bool {
    let body = address_body(address);
    if body.len() == address.len() || body.len() != 40 {
        return false;
    }
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return checksum_body(body) == body;
    }
    true
}

/// Parses an address into its 20 bytes.
pub fn parse_address(address: &str) -> Result<[u8; 20]> {
    if !is_address(address) {
        return Err(SwapError::Address(format!("invalid EVM address '{}'", address)));
    }
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(address_body(address), &mut bytes)
        .map_err(|_| SwapError::Address(format!("invalid EVM address '{}'", address)))?;
    Ok(bytes)
}

fn checksum_body(body: &str) -> String {
    let lower = body.to_ascii_lowercase();
    let hash = hex::encode(keccak256(lower.as_bytes()));
    lower
        .chars()
        .zip(hash.chars())
        .map(|(c, h)| {
            if c.is_ascii_alphabetic() && h.to_digit(16).unwrap_or(0) >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// EIP-55 checksum address with the given prefix
pub fn to_checksum_address(address: &[u8; 20], prefix: &str) -> String {
    format!("{}{}", prefix, checksum_body(&hex::encode(address)))
}

/// Parses a 32-byte hex value (with or without `0x`)
pub fn parse_bytes32(value: &str, what: &str) -> Result<[u8; 32]> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(strip_0x(value), &mut bytes)
        .map_err(|_| SwapError::Value(format!("{} must be 32 bytes hex, got '{}'", what, value)))?;
    Ok(bytes)
}
