//! Bitcoin HTLC witness script
//!
//! ```text
//! OP_IF
//!     OP_SHA256 <secret_hash> OP_EQUALVERIFY
//!     OP_DUP OP_HASH160 <recipient_pubkey_hash> OP_EQUALVERIFY OP_CHECKSIG
//! OP_ELSE
//!     <endtime> OP_CHECKLOCKTIMEVERIFY OP_DROP
//!     OP_DUP OP_HASH160 <sender_pubkey_hash> OP_EQUALVERIFY OP_CHECKSIG
//! OP_ENDIF
//! ```
//!
//! The script is paid to as P2WSH.

use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_HASH160, OP_IF,
    OP_SHA256,
};
use bitcoin::script::{Builder, Instruction};
use bitcoin::{Address, Network, Script, ScriptBuf};

use super::utils::{parse_address, pubkey_hash, sha256};
use super::Bitcoin;
use crate::error::{Result, SwapError};
use crate::evm::utils::parse_bytes32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinHtlc {
    network: Network,
    secret_hash: [u8; 32],
    recipient_pubkey_hash: [u8; 20],
    sender_pubkey_hash: [u8; 20],
    endtime: u32,
    script: ScriptBuf,
}

impl BitcoinHtlc {
    /// Builds the HTLC script.
    ///
    /// # Arguments
    ///
    /// * `secret_hash` - sha256 of the secret, 32 bytes hex
    /// * `recipient` - P2WPKH/P2PKH address allowed to withdraw with the secret
    /// * `sender` - P2WPKH/P2PKH address allowed to refund after `endtime`
    /// * `endtime` - Absolute lock time (block height or Unix timestamp)
    pub fn build_htlc(
        chain: &Bitcoin,
        secret_hash: &str,
        recipient: &str,
        sender: &str,
        endtime: u64,
    ) -> Result<Self> {
        let network = chain.bitcoin_network();
        let recipient = pubkey_hash(&parse_address(recipient, network)?)?;
        let sender = pubkey_hash(&parse_address(sender, network)?)?;
        if endtime == 0 {
            return Err(SwapError::Value("endtime must be a positive integer".to_string()));
        }
        let endtime = u32::try_from(endtime)
            .map_err(|_| SwapError::Value(format!("endtime {} does not fit a lock time", endtime)))?;
        Ok(Self::from_parts(
            network,
            parse_bytes32(secret_hash, "secret hash")?,
            recipient,
            sender,
            endtime,
        ))
    }

    /// Recovers the agreement from an HTLC script in hex.
    pub fn from_bytecode(chain: &Bitcoin, bytecode: &str) -> Result<Self> {
        let bytes = hex::decode(bytecode)
            .map_err(|_| SwapError::Value("HTLC bytecode is not hex".to_string()))?;
        Self::from_script(chain.bitcoin_network(), ScriptBuf::from_bytes(bytes))
    }

    pub(crate) fn from_script(network: Network, script: ScriptBuf) -> Result<Self> {
        let invalid = || SwapError::Value("script is not an HTLC script".to_string());
        let instructions = script
            .instructions()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        let secret_hash = push_at(&instructions, 2)
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .ok_or_else(invalid)?;
        let recipient = push_at(&instructions, 6)
            .and_then(|bytes| <[u8; 20]>::try_from(bytes).ok())
            .ok_or_else(invalid)?;
        let endtime = instructions
            .get(10)
            .and_then(Instruction::script_num)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(invalid)?;
        let sender = push_at(&instructions, 15)
            .and_then(|bytes| <[u8; 20]>::try_from(bytes).ok())
            .ok_or_else(invalid)?;

        let htlc = Self::from_parts(network, secret_hash, recipient, sender, endtime);
        if htlc.script != script {
            return Err(invalid());
        }
        Ok(htlc)
    }

    fn from_parts(
        network: Network,
        secret_hash: [u8; 32],
        recipient_pubkey_hash: [u8; 20],
        sender_pubkey_hash: [u8; 20],
        endtime: u32,
    ) -> Self {
        Self {
            network,
            secret_hash,
            recipient_pubkey_hash,
            sender_pubkey_hash,
            endtime,
            script: htlc_script(&secret_hash, &recipient_pubkey_hash, &sender_pubkey_hash, endtime),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Witness script in hex
    pub fn bytecode(&self) -> String {
        hex::encode(self.script.as_bytes())
    }

    pub fn opcode(&self) -> String {
        self.script.to_asm_string()
    }

    /// sha256 of the witness script (the P2WSH program)
    pub fn hash(&self) -> String {
        hex::encode(sha256(self.script.as_bytes()))
    }

    pub fn address(&self) -> String {
        Address::p2wsh(&self.script, self.network).to_string()
    }

    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2wsh(&self.script.wscript_hash())
    }

    pub fn secret_hash(&self) -> String {
        hex::encode(self.secret_hash)
    }

    pub fn recipient_pubkey_hash(&self) -> String {
        hex::encode(self.recipient_pubkey_hash)
    }

    pub fn sender_pubkey_hash(&self) -> String {
        hex::encode(self.sender_pubkey_hash)
    }

    pub fn endtime(&self) -> u32 {
        self.endtime
    }

    pub(crate) fn secret_hash_bytes(&self) -> [u8; 32] {
        self.secret_hash
    }

    pub(crate) fn recipient_pubkey_hash_bytes(&self) -> [u8; 20] {
        self.recipient_pubkey_hash
    }

    pub(crate) fn sender_pubkey_hash_bytes(&self) -> [u8; 20] {
        self.sender_pubkey_hash
    }

    /// Whether `secret` unlocks the hash lock
    pub fn matches_secret(&self, secret: &str) -> bool {
        sha256(secret.as_bytes()) == self.secret_hash
    }
}

fn push_at<'a>(instructions: &[Instruction<'a>], index: usize) -> Option<&'a [u8]> {
    match instructions.get(index) {
        Some(Instruction::PushBytes(bytes)) => Some(bytes.as_bytes()),
        _ => None,
    }
}

pub(crate) fn htlc_script(
    secret_hash: &[u8; 32],
    recipient_pubkey_hash: &[u8; 20],
    sender_pubkey_hash: &[u8; 20],
    endtime: u32,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_opcode(OP_SHA256)
        .push_slice(*secret_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(*recipient_pubkey_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_int(i64::from(endtime))
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(*sender_pubkey_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_layout() {
        let script = htlc_script(&[0x11; 32], &[0x22; 20], &[0x33; 20], 1_700_000_000);
        let asm = script.to_asm_string();
        assert!(asm.starts_with("OP_IF OP_SHA256 OP_PUSHBYTES_32 1111"));
        assert!(asm.contains("OP_DROP OP_DUP OP_HASH160 OP_PUSHBYTES_20 3333"));
        assert!(asm.ends_with("OP_EQUALVERIFY OP_CHECKSIG OP_ENDIF"));
    }

    #[test]
    fn test_from_script_round_trip() {
        let script = htlc_script(&[0x11; 32], &[0x22; 20], &[0x33; 20], 650_000);
        let htlc = BitcoinHtlc::from_script(Network::Testnet, script.clone()).unwrap();
        assert_eq!(htlc.endtime(), 650_000);
        assert_eq!(htlc.recipient_pubkey_hash(), "22".repeat(20));
        assert_eq!(htlc.sender_pubkey_hash(), "33".repeat(20));
        assert_eq!(htlc.script(), script.as_script());
        assert!(htlc.address().starts_with("tb1q"));
    }

    #[test]
    fn test_from_script_rejects_other_scripts() {
        let script = ScriptBuf::from_bytes(vec![0x51]);
        assert!(matches!(
            BitcoinHtlc::from_script(Network::Bitcoin, script),
            Err(SwapError::Value(_))
        ));
    }

    #[test]
    fn test_matches_secret() {
        let secret_hash = sha256(b"open sesame");
        let htlc = BitcoinHtlc::from_parts(Network::Bitcoin, secret_hash, [0; 20], [1; 20], 100);
        assert!(htlc.matches_secret("open sesame"));
        assert!(!htlc.matches_secret("Hello"));
    }
}
