//! Vapor HTLC contract program
//!
//! The Equity contract body is fixed; an agreement is the four arguments
//! pushed in front of it:
//!
//! ```text
//! <endblock> <sender_public_key> <recipient_public_key> <secret_hash> <body>
//! ```
//!
//! The contract is locked with a P2WSH control program over `sha3_256(bytecode)`.

use sha2::{Digest, Sha256};

use super::utils::{program_address, sha3_256};
use super::Vapor;
use crate::core::SwapChain;
use crate::error::{Result, SwapError};
use crate::evm::utils::parse_bytes32;

/// Compiled body of the HTLC contract
pub const HTLC_BODY: [u8; 35] = [
    0x74, 0x1f, 0x54, 0x7a, 0x64, 0x16, 0x00, 0x00, 0x00, 0x55, 0x7a, 0xa8, 0x88, 0x53, 0x7a, 0x7c, 0xae, 0x7c, 0xac, 0x63, 0x1f, 0x00, 0x00, 0x00, 0x53, 0x7a, 0xcd, 0x9f, 0x69, 0x72, 0xae, 0x7c, 0xac, 0x00, 0xc0,
];

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_16: u8 = 0x60;
const MAX_DIRECT_PUSH: usize = 0x4b;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaporHtlc {
    network: String,
    secret_hash: [u8; 32],
    recipient_public_key: [u8; 32],
    sender_public_key: [u8; 32],
    endblock: u64,
    bytecode: Vec<u8>,
}

impl VaporHtlc {
    /// Builds the contract program.
    ///
    /// # Arguments
    ///
    /// * `secret_hash` - sha256 of the secret, 32 bytes hex
    /// * `recipient_public_key` - ed25519 key allowed to withdraw with the secret
    /// * `sender_public_key` - ed25519 key allowed to refund after `endblock`
    /// * `endblock` - Block height after which refund is possible
    pub fn build_htlc(
        chain: &Vapor,
        secret_hash: &str,
        recipient_public_key: &str,
        sender_public_key: &str,
        endblock: u64,
    ) -> Result<Self> {
        let recipient = parse_public_key(recipient_public_key)?;
        let sender = parse_public_key(sender_public_key)?;
        if endblock == 0 {
            return Err(SwapError::Value("endblock must be a positive integer".to_string()));
        }
        Ok(Self::from_parts(
            chain.network(),
            parse_bytes32(secret_hash, "secret hash")?,
            recipient,
            sender,
            endblock,
        ))
    }

    /// Recovers the agreement from contract bytecode in hex.
    pub fn from_bytecode(chain: &Vapor, bytecode: &str) -> Result<Self> {
        let bytes = hex::decode(bytecode)
            .map_err(|_| SwapError::Value("HTLC bytecode is not hex".to_string()))?;
        Self::from_program(chain.network(), &bytes)
    }

    pub(crate) fn from_program(network: &str, bytecode: &[u8]) -> Result<Self> {
        let invalid = || SwapError::Value("bytecode is not an HTLC program".to_string());
        let mut rest = bytecode;
        let mut args = Vec::with_capacity(4);
        for _ in 0..4 {
            let (arg, tail) = read_push(rest).ok_or_else(invalid)?;
            args.push(arg);
            rest = tail;
        }
        if rest != HTLC_BODY {
            return Err(invalid());
        }

        let key = |bytes: &[u8]| <[u8; 32]>::try_from(bytes).map_err(|_| invalid());
        if args[0].len() > 8 {
            return Err(invalid());
        }
        let mut endblock = [0u8; 8];
        endblock[..args[0].len()].copy_from_slice(&args[0]);

        let htlc = Self::from_parts(
            network,
            key(&args[3])?,
            key(&args[2])?,
            key(&args[1])?,
            u64::from_le_bytes(endblock),
        );
        if htlc.bytecode != bytecode {
            return Err(invalid());
        }
        Ok(htlc)
    }

    fn from_parts(
        network: &str,
        secret_hash: [u8; 32],
        recipient_public_key: [u8; 32],
        sender_public_key: [u8; 32],
        endblock: u64,
    ) -> Self {
        let mut bytecode = Vec::with_capacity(140);
        push_int(&mut bytecode, endblock);
        push_data(&mut bytecode, &sender_public_key);
        push_data(&mut bytecode, &recipient_public_key);
        push_data(&mut bytecode, &secret_hash);
        bytecode.extend_from_slice(&HTLC_BODY);
        Self {
            network: network.to_string(),
            secret_hash,
            recipient_public_key,
            sender_public_key,
            endblock,
            bytecode,
        }
    }

    pub fn bytecode(&self) -> String {
        hex::encode(&self.bytecode)
    }

    /// sha3-256 of the bytecode (the P2WSH program)
    pub fn hash(&self) -> String {
        hex::encode(sha3_256(&self.bytecode))
    }

    pub fn address(&self) -> Result<String> {
        program_address(&self.bytecode, &self.network)
    }

    /// P2WSH control program locking funds to the contract
    pub fn control_program(&self) -> String {
        format!("0020{}", self.hash())
    }

    pub fn secret_hash(&self) -> String {
        hex::encode(self.secret_hash)
    }

    pub fn recipient_public_key(&self) -> String {
        hex::encode(self.recipient_public_key)
    }

    pub fn sender_public_key(&self) -> String {
        hex::encode(self.sender_public_key)
    }

    pub fn endblock(&self) -> u64 {
        self.endblock
    }

    pub(crate) fn recipient_public_key_bytes(&self) -> [u8; 32] {
        self.recipient_public_key
    }

    pub(crate) fn sender_public_key_bytes(&self) -> [u8; 32] {
        self.sender_public_key
    }

    /// Whether `secret` unlocks the hash lock
    pub fn matches_secret(&self, secret: &str) -> bool {
        <[u8; 32]>::from(Sha256::digest(secret.as_bytes())) == self.secret_hash
    }
}

pub(crate) fn parse_public_key(public_key: &str) -> Result<[u8; 32]> {
    hex::decode(public_key)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| {
            SwapError::Address(format!(
                "invalid public key '{}': expected 32 bytes hex",
                public_key
            ))
        })
}

fn push_data(program: &mut Vec<u8>, data: &[u8]) {
    if data.is_empty() {
        program.push(OP_0);
        return;
    }
    // Contract arguments never exceed a direct push.
    program.push(data.len() as u8);
    program.extend_from_slice(data);
}

/// Minimal little-endian integer push; 1 to 16 use the small integer opcodes.
fn push_int(program: &mut Vec<u8>, value: u64) {
    match value {
        0 => program.push(OP_0),
        1..=16 => program.push(OP_1 + (value as u8) - 1),
        _ => {
            let bytes = value.to_le_bytes();
            let len = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            push_data(program, &bytes[..len]);
        }
    }
}

/// Reads one push; small integer opcodes yield their little-endian value.
fn read_push(program: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    let (&op, rest) = program.split_first()?;
    match op {
        OP_0 => Some((Vec::new(), rest)),
        OP_1..=OP_16 => Some((vec![op - OP_1 + 1], rest)),
        len if (len as usize) <= MAX_DIRECT_PUSH => {
            let len = len as usize;
            (rest.len() >= len).then(|| (rest[..len].to_vec(), &rest[len..]))
        }
        _ => None,
    }
}
