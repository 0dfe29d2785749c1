//! Vapor network and address helpers
//!
//! Addresses are segwit-style bech32 strings over a version 0 program: the
//! ripemd160 of an ed25519 public key, or the sha3-256 of a contract program.

use bitcoin::bech32::{self, segwit, Hrp};
use bitcoin::hashes::{ripemd160, Hash};
use sha3::{Digest, Sha3_256};

use crate::error::{Result, SwapError};

pub const NETWORKS: [&str; 3] = ["mainnet", "solonet", "testnet"];

pub fn is_network(network: &str) -> bool {
    NETWORKS.contains(&network)
}

/// Human readable address prefix of a network
pub fn hrp(network: &str) -> Result<&'static str> {
    match network {
        "mainnet" => Ok("vp"),
        "testnet" => Ok("tp"),
        "solonet" => Ok("sp"),
        other => Err(SwapError::Network(format!("unknown vapor network '{}'", other))),
    }
}

pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    Sha3_256::digest(data).into()
}

fn encode(network: &str, program: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(hrp(network)?)
        .map_err(|e| SwapError::Address(format!("invalid address prefix: {}", e)))?;
    segwit::encode(hrp, segwit::VERSION_0, program)
        .map_err(|e| SwapError::Address(format!("cannot encode address: {}", e)))
}

/// Address controlled by an ed25519 public key
pub fn public_key_address(public_key: &[u8; 32], network: &str) -> Result<String> {
    encode(network, &ripemd160::Hash::hash(public_key).to_byte_array())
}

/// Address of a contract program
pub fn program_address(program: &[u8], network: &str) -> Result<String> {
    encode(network, &sha3_256(program))
}

/// Decodes an address into its network and witness program.
pub fn decode_address(address: &str) -> Result<(&'static str, Vec<u8>)> {
    let (prefix, version, program) = segwit::decode(address)
        .map_err(|e| SwapError::Address(format!("invalid vapor address '{}': {}", address, e)))?;
    if version != bech32::Fe32::Q {
        return Err(SwapError::Address(format!(
            "unsupported witness version in '{}'",
            address
        )));
    }
    let network = NETWORKS
        .into_iter()
        .find(|network| hrp(network).map_or(false, |expected| prefix.as_str() == expected))
        .ok_or_else(|| SwapError::Address(format!("unknown vapor address prefix in '{}'", address)))?;
    Ok((network, program))
}

/// Checks an address, optionally against a network. Never fails.
pub fn is_address(address: &str, network: Option<&str>) -> bool {
    match decode_address(address) {
        Ok((decoded, _)) => network.map_or(true, |network| decoded == network),
        Err(_) => false,
    }
}

/// Control program (`0014`/`0020` + program) of an address
pub fn control_program(address: &str) -> Result<String> {
    let (_, program) = decode_address(address)?;
    Ok(format!("00{:02x}{}", program.len(), hex::encode(program)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER_PUBLIC_KEY: &str = "fe6b3fd4458291b19605d92837ae1060cc0237e68022b2eb9faf01a118226212";

    #[test]
    fn test_public_key_address() {
        let public_key: [u8; 32] = hex::decode(SENDER_PUBLIC_KEY).unwrap().try_into().unwrap();
        assert_eq!(
            public_key_address(&public_key, "mainnet").unwrap(),
            "vp1qk9vj4jaezlcnjdckds4fkm8fwv5kawmqwpnpvs"
        );
        assert!(public_key_address(&public_key, "testnet").unwrap().starts_with("tp1q"));
    }

    #[test]
    fn test_is_address() {
        let address = "vp1qk9vj4jaezlcnjdckds4fkm8fwv5kawmqwpnpvs";
        assert!(is_address(address, None));
        assert!(is_address(address, Some("mainnet")));
        assert!(!is_address(address, Some("solonet")));
        assert!(!is_address("bad-string", None));
        assert!(!is_address("bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu", None));
    }

    #[test]
    fn test_control_program() {
        assert_eq!(
            control_program("vp1qk9vj4jaezlcnjdckds4fkm8fwv5kawmqwpnpvs").unwrap(),
            "0014b1592acbb917f13937166c2a9b6ce973296ebb60"
        );
    }

    #[test]
    fn test_is_network() {
        assert!(is_network("solonet"));
        assert!(!is_network("unknown"));
    }
}
