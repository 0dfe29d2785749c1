//! Minimal Solidity ABI encoding for the HTLC contract calls and events

use ethereum_types::U256;

use super::utils::keccak256;

/// Argument of a contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Bytes32([u8; 32]),
    Address([u8; 20]),
    Uint(U256),
    String(String),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_))
    }

    fn head_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Token::Bytes32(bytes) => word.copy_from_slice(bytes),
            Token::Address(address) => word[12..].copy_from_slice(address),
            Token::Uint(value) => value.to_big_endian(&mut word),
            Token::String(_) => {}
        }
        word
    }
}

/// First four bytes of `keccak256(signature)`
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic 0 of an event: `keccak256(signature)`
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

fn usize_word(value: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    U256::from(value).to_big_endian(&mut word);
    word
}

/// Encodes a call: selector followed by the ABI-encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(32 * tokens.len());
    let mut tail = Vec::new();
    let head_size = 32 * tokens.len();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(head_size + tail.len()));
            if let Token::String(value) = token {
                let bytes = value.as_bytes();
                tail.extend_from_slice(&usize_word(bytes.len()));
                tail.extend_from_slice(bytes);
                let padding = (32 - bytes.len() % 32) % 32;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        } else {
            head.extend_from_slice(&token.head_word());
        }
    }

    let mut encoded = selector(signature).to_vec();
    encoded.extend(head);
    encoded.extend(tail);
    encoded
}

/// Splits event data into 32-byte words.
pub fn words(data: &[u8]) -> Option<Vec<[u8; 32]>> {
    if data.len() % 32 != 0 {
        return None;
    }
    Some(
        data.chunks(32)
            .map(|chunk| {
                let mut word = [0u8; 32];
                word.copy_from_slice(chunk);
                word
            })
            .collect(),
    )
}

pub fn word_to_address(word: &[u8; 32]) -> [u8; 20] {
    let mut address = [0u8; 20];
    address.copy_from_slice(&word[12..]);
    address
}
