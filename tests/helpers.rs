//! Shared test helpers for swap integration tests
//!
//! Constants, configs pointing at mock servers and key material derived from
//! well-known mnemonics.

#![allow(dead_code)]

use bitcoin::NetworkKind;
use serde_json::json;
use swap::{Bip32Wallet, BitcoinConfig, EvmConfig, VaporConfig};

// ============================================================================
// CONSTANTS
// ============================================================================

// ------------------------------- MNEMONICS ------------------------------

/// BIP39 test mnemonic (all-`abandon` vector)
pub const ABANDON_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Mnemonic of the Vapor HTLC sender
pub const VAPOR_MNEMONIC: &str =
    "unfair divorce remind addict add roof park clown build renew illness fault";

// --------------------------------- KEYS ---------------------------------

/// Chainkd root key of [`VAPOR_MNEMONIC`]
pub const VAPOR_XPRIVATE_KEY: &str = "58775359b7b3588dcdc1bcf373489fa1272cacc03909f78469657b0208e66e46daedfdd0fd8f8df14e2084c7e8df4701db3062dded1c713e0aae734ac09c4afd";

/// Public key of [`VAPOR_XPRIVATE_KEY`] at `m/44/153/1/0/1`
pub const VAPOR_SENDER_PUBLIC_KEY: &str =
    "fe6b3fd4458291b19605d92837ae1060cc0237e68022b2eb9faf01a118226212";

/// Address of [`VAPOR_SENDER_PUBLIC_KEY`] on mainnet
pub const VAPOR_SENDER_ADDRESS: &str = "vp1qk9vj4jaezlcnjdckds4fkm8fwv5kawmqwpnpvs";

pub const VAPOR_RECIPIENT_PUBLIC_KEY: &str =
    "3e0a377ae4afa031d4551599d9bb7d5b27f4736d77f78cac4d476f0ffba5ae3e";

/// Ethereum address of [`ABANDON_MNEMONIC`] at `m/44'/60'/0'/0/0`
pub const ABANDON_ETHEREUM_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

/// Bitcoin address of [`ABANDON_MNEMONIC`] at `m/84'/0'/0'/0/0`
pub const ABANDON_BITCOIN_ADDRESS: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";

// --------------------------------- HTLC ---------------------------------

/// Secret preimage of the Bitcoin and EVM HTLCs
pub const SECRET: &str = "Hello Swap!";

/// Vapor HTLC secret hash
pub const VAPOR_SECRET_HASH: &str =
    "3a26da82ead15a80533a02696656b14b5dbfd84eb14790f2e1be5e9e45820eeb";

pub const VAPOR_ENDBLOCK: u64 = 120_639_276;

pub const VAPOR_BYTECODE: &str = "042ccf300720fe6b3fd4458291b19605d92837ae1060cc0237e68022b2eb9faf01a118226212203e0a377ae4afa031d4551599d9bb7d5b27f4736d77f78cac4d476f0ffba5ae3e203a26da82ead15a80533a02696656b14b5dbfd84eb14790f2e1be5e9e45820eeb741f547a6416000000557aa888537a7cae7cac631f000000537acd9f6972ae7cac00c0";

pub const VAPOR_HTLC_ADDRESS: &str =
    "vp1q2hsevnlxkhpn82ptxveh3d63s2rt5rv4mjuyzeua73kpetvclcjqeeg86a";

/// Vapor funding transaction used by the refund flow
pub const VAPOR_FUNDING_HASH: &str =
    "37b36d7be5dfda0cc5dc3c918705464ff901dc5eadb6f4f049db03a679e02bfe";

/// Dummy HTLC contract address (EVM format, 40 hex characters)
pub const DUMMY_CONTRACT_ADDR_EVM: &str = "0x000000000000000000000000000000000000000e";

/// Dummy recipient address (EVM format, 40 hex characters)
pub const DUMMY_RECIPIENT_ADDR_EVM: &str = "0x0000000000000000000000000000000000000006";

/// Dummy funding transaction hash (EVM format)
pub const DUMMY_TX_HASH_EVM: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000f1";

/// Dummy locked contract id
pub const DUMMY_LOCKED_CONTRACT_ID: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000c1";

// ============================================================================
// HELPERS
// ============================================================================

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// sha256 of [`SECRET`] in hex
pub fn secret_hash() -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(SECRET.as_bytes()))
}

/// BIP32 root key of the all-`abandon` mnemonic
pub fn abandon_xprivate_key() -> String {
    Bip32Wallet::from_mnemonic(ABANDON_MNEMONIC, "", NetworkKind::Main)
        .unwrap()
        .xprivate_key()
}

pub fn evm_config(rpc_url: &str) -> EvmConfig {
    EvmConfig {
        network: "mainnet".to_string(),
        rpc_url: rpc_url.to_string(),
        chain_id: 1,
        contract_address: DUMMY_CONTRACT_ADDR_EVM.to_string(),
    }
}

pub fn bitcoin_config(api_url: &str) -> BitcoinConfig {
    BitcoinConfig {
        network: "mainnet".to_string(),
        api_url: api_url.to_string(),
        fee_rate: Some(2.0),
        confirmation_target: 6,
    }
}

pub fn vapor_config(api_url: &str) -> VaporConfig {
    VaporConfig {
        api_url: api_url.to_string(),
        ..VaporConfig::mainnet()
    }
}

/// JSON-RPC success envelope
pub fn rpc_result(result: serde_json::Value) -> serde_json::Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

/// Blockcenter success envelope
pub fn blockcenter_data(data: serde_json::Value) -> serde_json::Value {
    json!({"code": 200, "msg": "", "data": data})
}
