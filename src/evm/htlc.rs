//! EVM HTLC descriptor
//!
//! The HTLC contract is deployed once per chain; a descriptor pairs its
//! address with the agreement a fund call will lock.

use chain_clients_evm::Log;
use ethereum_types::U256;
use tracing::info;

use super::abi::{self, Token};
use super::utils::{address_prefix, parse_address, parse_bytes32, to_checksum_address};
use super::Evm;
use crate::core::ChainKind;
use crate::error::{Result, SwapError};

pub const FUND_SIGNATURE: &str = "fund(bytes32,address,address,uint256)";
pub const WITHDRAW_SIGNATURE: &str = "withdraw(bytes32,string)";
pub const REFUND_SIGNATURE: &str = "refund(bytes32)";
pub const LOG_FUND_SIGNATURE: &str = "log_fund(bytes32,bytes32,address,address,uint256,uint256)";

/// ABI of the HTLC contract
pub const HTLC_ABI: &str = r#"[{"type":"function","name":"fund","stateMutability":"payable","inputs":[{"name":"secret_hash","type":"bytes32"},{"name":"recipient","type":"address"},{"name":"sender","type":"address"},{"name":"endtime","type":"uint256"}],"outputs":[{"name":"locked_contract_id","type":"bytes32"}]},{"type":"function","name":"withdraw","stateMutability":"nonpayable","inputs":[{"name":"locked_contract_id","type":"bytes32"},{"name":"secret_key","type":"string"}],"outputs":[{"name":"","type":"bool"}]},{"type":"function","name":"refund","stateMutability":"nonpayable","inputs":[{"name":"locked_contract_id","type":"bytes32"}],"outputs":[{"name":"","type":"bool"}]},{"type":"event","name":"log_fund","anonymous":false,"inputs":[{"name":"locked_contract_id","type":"bytes32","indexed":true},{"name":"secret_hash","type":"bytes32","indexed":false},{"name":"recipient","type":"address","indexed":true},{"name":"sender","type":"address","indexed":true},{"name":"amount","type":"uint256","indexed":false},{"name":"endtime","type":"uint256","indexed":false}]}]"#;

/// Terms locked by a fund call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtlcAgreement {
    pub secret_hash: [u8; 32],
    pub recipient: [u8; 20],
    pub sender: [u8; 20],
    pub endtime: u64,
}

/// Decoded `log_fund` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundEvent {
    pub locked_contract_id: [u8; 32],
    pub agreement: HtlcAgreement,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmHtlc {
    kind: ChainKind,
    contract_address: [u8; 20],
    agreement: Option<HtlcAgreement>,
    locked_contract_id: Option<[u8; 32]>,
}

impl EvmHtlc {
    /// Descriptor for the chain's configured HTLC contract
    pub fn new(chain: &Evm) -> Result<Self> {
        Self::at(chain.kind_of(), &chain.config().contract_address)
    }

    /// Descriptor for the HTLC contract at `contract_address`
    pub fn at(kind: ChainKind, contract_address: &str) -> Result<Self> {
        Ok(Self {
            kind,
            contract_address: parse_address(contract_address)?,
            agreement: None,
            locked_contract_id: None,
        })
    }

    /// Sets the agreement a fund transaction will lock.
    ///
    /// # Arguments
    ///
    /// * `secret_hash` - sha256 of the secret, 32 bytes hex
    /// * `recipient` - Address allowed to withdraw with the secret
    /// * `sender` - Address allowed to refund after `endtime`
    /// * `endtime` - Unix timestamp after which refund is possible
    pub fn build_htlc(
        mut self,
        secret_hash: &str,
        recipient: &str,
        sender: &str,
        endtime: u64,
    ) -> Result<Self> {
        if endtime == 0 {
            return Err(SwapError::Value("endtime must be a positive integer".to_string()));
        }
        self.agreement = Some(HtlcAgreement {
            secret_hash: parse_bytes32(secret_hash, "secret hash")?,
            recipient: parse_address(recipient)?,
            sender: parse_address(sender)?,
            endtime,
        });
        Ok(self)
    }

    /// Resolves the contract address from the HTLC deployment transaction.
    pub async fn from_transaction_hash(chain: &Evm, transaction_hash: &str) -> Result<Self> {
        let receipt = chain
            .client()
            .get_transaction_receipt(transaction_hash)
            .await?
            .ok_or_else(|| SwapError::NotFound(format!("transaction '{}'", transaction_hash)))?;
        let contract_address = receipt.contract_address.ok_or_else(|| {
            SwapError::NotFound(format!(
                "transaction '{}' did not deploy a contract",
                transaction_hash
            ))
        })?;
        info!("HTLC contract {} from deployment {}", contract_address, transaction_hash);
        Self::at(chain.kind_of(), &contract_address)
    }

    /// Reconstructs the descriptor, agreement and locked contract id from a
    /// funding transaction's `log_fund` event.
    pub async fn from_funding_transaction(chain: &Evm, transaction_hash: &str) -> Result<Self> {
        let (contract_address, event) = chain.fund_event(transaction_hash).await?;
        Ok(Self {
            kind: chain.kind_of(),
            contract_address,
            agreement: Some(event.agreement),
            locked_contract_id: Some(event.locked_contract_id),
        })
    }

    pub fn contract_address(&self) -> String {
        to_checksum_address(&self.contract_address, address_prefix(self.kind))
    }

    pub(crate) fn contract_address_bytes(&self) -> [u8; 20] {
        self.contract_address
    }

    pub fn abi(&self) -> &'static str {
        HTLC_ABI
    }

    pub fn agreement(&self) -> Option<&HtlcAgreement> {
        self.agreement.as_ref()
    }

    pub fn locked_contract_id(&self) -> Option<String> {
        self.locked_contract_id
            .map(|id| format!("0x{}", hex::encode(id)))
    }

    pub fn secret_hash(&self) -> Option<String> {
        self.agreement.as_ref().map(|a| hex::encode(a.secret_hash))
    }

    pub fn recipient_address(&self) -> Option<String> {
        self.agreement
            .as_ref()
            .map(|a| to_checksum_address(&a.recipient, address_prefix(self.kind)))
    }

    pub fn sender_address(&self) -> Option<String> {
        self.agreement
            .as_ref()
            .map(|a| to_checksum_address(&a.sender, address_prefix(self.kind)))
    }

    pub fn endtime(&self) -> Option<u64> {
        self.agreement.as_ref().map(|a| a.endtime)
    }
}

// ============================================================================
// CALLDATA AND EVENTS
// ============================================================================

pub fn fund_calldata(agreement: &HtlcAgreement) -> Vec<u8> {
    abi::encode_call(
        FUND_SIGNATURE,
        &[
            Token::Bytes32(agreement.secret_hash),
            Token::Address(agreement.recipient),
            Token::Address(agreement.sender),
            Token::Uint(U256::from(agreement.endtime)),
        ],
    )
}

pub fn withdraw_calldata(locked_contract_id: [u8; 32], secret: &str) -> Vec<u8> {
    abi::encode_call(
        WITHDRAW_SIGNATURE,
        &[
            Token::Bytes32(locked_contract_id),
            Token::String(secret.to_string()),
        ],
    )
}

pub fn refund_calldata(locked_contract_id: [u8; 32]) -> Vec<u8> {
    abi::encode_call(REFUND_SIGNATURE, &[Token::Bytes32(locked_contract_id)])
}

/// Decodes a `log_fund` log; `None` if the log is another event or malformed.
pub fn decode_fund_log(log: &Log) -> Option<FundEvent> {
    let topics: Vec<[u8; 32]> = log
        .topics
        .iter()
        .map(|topic| parse_bytes32(topic, "topic").ok())
        .collect::<Option<_>>()?;
    if topics.len() != 4 || topics[0] != abi::event_topic(LOG_FUND_SIGNATURE) {
        return None;
    }
    let data = hex::decode(chain_clients_common::strip_0x(&log.data)).ok()?;
    let words = abi::words(&data)?;
    if words.len() != 3 {
        return None;
    }
    let endtime = U256::from_big_endian(&words[2]);
    Some(FundEvent {
        locked_contract_id: topics[1],
        agreement: HtlcAgreement {
            secret_hash: words[0],
            recipient: abi::word_to_address(&topics[2]),
            sender: abi::word_to_address(&topics[3]),
            endtime: u64::try_from(endtime).ok()?,
        },
        amount: U256::from_big_endian(&words[1]),
    })
}
