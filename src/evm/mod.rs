//! EVM chain family (Ethereum, XinFin)
//!
//! HTLC transactions are legacy EIP-155 transactions calling the pre-deployed
//! HTLC contract. Fee is `gas * gas_price` in wei.

pub mod abi;
pub mod htlc;
pub mod solver;
pub mod utils;

use async_trait::async_trait;
use chain_clients_evm::{CallRequest, EvmClient};
use ethereum_types::U256;
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EvmConfig;
use crate::core::{ChainKind, Role, Spend, SwapChain};
use crate::error::{Result, SwapError};
use crate::units::{Unit, ETHEREUM_UNITS, XINFIN_UNITS};
use crate::wallet::Bip32Wallet;

pub use htlc::{EvmHtlc, FundEvent, HtlcAgreement};
pub use solver::{FundSolver, RefundSolver, WithdrawSolver};
pub use utils::{is_address, is_ethereum_network, is_xinfin_network, to_checksum_address};

use htlc::{decode_fund_log, fund_calldata, refund_calldata, withdraw_calldata};
use utils::{address_prefix, keccak256, parse_address};

pub const ETHEREUM_BIP44: &str = "m/44'/60'/{account}'/{change}/{address}";
pub const XINFIN_BIP44: &str = "m/44'/550'/{account}'/{change}/{address}";

// ============================================================================
// TRANSACTION TYPES
// ============================================================================

/// Unsigned legacy transaction as stored in transaction raws
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTransaction {
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    pub value: U256,
    pub nonce: u64,
    pub gas: u64,
    pub gas_price: U256,
    /// Hex calldata (`0x...`)
    pub data: String,
}

/// Signed transaction parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmSignature {
    pub hash: String,
    pub raw_transaction: String,
    pub r: String,
    pub s: String,
    pub v: u64,
}

/// Transaction before gas estimation
#[derive(Debug, Clone)]
pub struct EvmDraft {
    from: [u8; 20],
    to: [u8; 20],
    value: U256,
    data: Vec<u8>,
    nonce: u64,
    gas_price: U256,
    gas: Option<u64>,
}

/// Signing key and the address it controls
pub struct EvmKeys {
    pub signing_key: SigningKey,
    pub address: [u8; 20],
}

impl EvmKeys {
    pub fn from_wallet(wallet: &Bip32Wallet) -> Result<Self> {
        let secret = wallet.secret_key().secret_bytes();
        let signing_key = SigningKey::from_slice(&secret)
            .map_err(|e| SwapError::Value(format!("invalid private key: {}", e)))?;
        Ok(Self {
            address: address_of(&signing_key),
            signing_key,
        })
    }
}

/// Address controlled by a signing key: last 20 bytes of keccak(uncompressed pubkey)
pub fn address_of(signing_key: &SigningKey) -> [u8; 20] {
    let public_key = signing_key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&public_key.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

// ============================================================================
// CHAIN
// ============================================================================

#[derive(Debug, Clone)]
pub struct Evm {
    kind: ChainKind,
    config: EvmConfig,
    client: EvmClient,
}

impl Evm {
    pub fn ethereum(config: &EvmConfig) -> Result<Self> {
        Self::with_kind(ChainKind::Ethereum, config)
    }

    pub fn xinfin(config: &EvmConfig) -> Result<Self> {
        Self::with_kind(ChainKind::XinFin, config)
    }

    fn with_kind(kind: ChainKind, config: &EvmConfig) -> Result<Self> {
        let known = match kind {
            ChainKind::XinFin => is_xinfin_network(&config.network),
            _ => is_ethereum_network(&config.network),
        };
        if !known {
            return Err(SwapError::Network(format!(
                "unknown {} network '{}'",
                kind, config.network
            )));
        }
        parse_address(&config.contract_address)?;
        Ok(Self {
            kind,
            config: config.clone(),
            client: EvmClient::new(&config.rpc_url)?,
        })
    }

    pub fn kind_of(&self) -> ChainKind {
        self.kind
    }

    pub fn config(&self) -> &EvmConfig {
        &self.config
    }

    pub fn client(&self) -> &EvmClient {
        &self.client
    }

    /// BIP44 path template for this flavour
    pub fn bip44_template(&self) -> &'static str {
        match self.kind {
            ChainKind::XinFin => XINFIN_BIP44,
            _ => ETHEREUM_BIP44,
        }
    }

    /// Checksummed address of a wallet's signing key
    pub fn wallet_address(&self, wallet: &Bip32Wallet) -> Result<String> {
        Ok(self.display_address(&EvmKeys::from_wallet(wallet)?.address))
    }

    fn display_address(&self, address: &[u8; 20]) -> String {
        to_checksum_address(address, address_prefix(self.kind))
    }

    /// Fetches the funding receipt and decodes `log_fund` at log index 0.
    pub async fn fund_event(&self, transaction_hash: &str) -> Result<([u8; 20], FundEvent)> {
        let receipt = self
            .client
            .get_transaction_receipt(transaction_hash)
            .await?
            .ok_or_else(|| SwapError::NotFound(format!("funding transaction '{}'", transaction_hash)))?;
        let log = receipt.logs.first().ok_or_else(|| {
            SwapError::NotFound(format!("no logs in funding transaction '{}'", transaction_hash))
        })?;
        let event = decode_fund_log(log).ok_or_else(|| {
            SwapError::NotFound(format!(
                "no log_fund event at index 0 of '{}'",
                transaction_hash
            ))
        })?;
        let contract_address = parse_address(&log.address)?;
        info!(
            "Funding {} locked contract 0x{}",
            transaction_hash,
            hex::encode(event.locked_contract_id)
        );
        Ok((contract_address, event))
    }
}

// ============================================================================
// RLP AND SIGNING
// ============================================================================

fn parse_hex_data(data: &str) -> Result<Vec<u8>> {
    hex::decode(chain_clients_common::strip_0x(data))
        .map_err(|_| SwapError::Value(format!("invalid calldata '{}'", data)))
}

fn append_body(stream: &mut RlpStream, transaction: &EvmTransaction) -> Result<()> {
    stream.append(&transaction.nonce);
    stream.append(&transaction.gas_price);
    stream.append(&transaction.gas);
    stream.append(&parse_address(&transaction.to)?.to_vec());
    stream.append(&transaction.value);
    stream.append(&parse_hex_data(&transaction.data)?);
    Ok(())
}

/// EIP-155 signing payload: `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`
pub fn unsigned_rlp(transaction: &EvmTransaction) -> Result<Vec<u8>> {
    let mut stream = RlpStream::new_list(9);
    append_body(&mut stream, transaction)?;
    stream.append(&transaction.chain_id);
    stream.append(&0u8);
    stream.append(&0u8);
    Ok(stream.out().to_vec())
}

/// Signs a legacy transaction with EIP-155 replay protection (RFC6979, low-s).
pub fn sign_legacy(transaction: &EvmTransaction, signing_key: &SigningKey) -> Result<EvmSignature> {
    let signing_hash = keccak256(&unsigned_rlp(transaction)?);
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&signing_hash)
        .map_err(|e| SwapError::Value(format!("signing failed: {}", e)))?;

    let v = u64::from(recovery_id.to_byte()) + 35 + transaction.chain_id * 2;
    let bytes = signature.to_bytes();
    let r = U256::from_big_endian(&bytes[..32]);
    let s = U256::from_big_endian(&bytes[32..]);

    let mut stream = RlpStream::new_list(9);
    append_body(&mut stream, transaction)?;
    stream.append(&v);
    stream.append(&r);
    stream.append(&s);
    let raw = stream.out().to_vec();

    Ok(EvmSignature {
        hash: format!("0x{}", hex::encode(keccak256(&raw))),
        raw_transaction: format!("0x{}", hex::encode(&raw)),
        r: format!("0x{}", hex::encode(&bytes[..32])),
        s: format!("0x{}", hex::encode(&bytes[32..])),
        v,
    })
}

fn hex_quantity(value: U256) -> String {
    format!("0x{:x}", value)
}

// ============================================================================
// SWAP CHAIN
// ============================================================================

#[async_trait(?Send)]
impl SwapChain for Evm {
    type Htlc = EvmHtlc;
    type Amount = U256;
    type Draft = EvmDraft;
    type Transaction = EvmTransaction;
    type Signature = EvmSignature;
    type Keys = EvmKeys;

    fn kind(&self) -> ChainKind {
        self.kind
    }

    fn network(&self) -> &str {
        &self.config.network
    }

    fn units(&self) -> &'static [Unit] {
        match self.kind {
            ChainKind::XinFin => XINFIN_UNITS,
            _ => ETHEREUM_UNITS,
        }
    }

    async fn prepare_fund(&self, address: &str, htlc: &EvmHtlc, amount: U256) -> Result<EvmDraft> {
        let from = parse_address(address)?;
        let agreement = htlc
            .agreement()
            .ok_or_else(|| SwapError::Value("HTLC agreement is not built".to_string()))?;
        if from != agreement.sender {
            return Err(SwapError::Address(format!(
                "'{}' is not the HTLC sender '{}'",
                address,
                self.display_address(&agreement.sender)
            )));
        }
        if amount.is_zero() {
            return Err(SwapError::Value("amount must be positive".to_string()));
        }

        let from_hex = format!("0x{}", hex::encode(from));
        let nonce = self.client.get_transaction_count(&from_hex).await?;
        let gas_price = U256::from(self.client.gas_price().await?);

        Ok(EvmDraft {
            from,
            to: htlc.contract_address_bytes(),
            value: amount,
            data: fund_calldata(agreement),
            nonce,
            gas_price,
            gas: None,
        })
    }

    async fn prepare_spend(&self, role: Role, spend: Spend<'_, EvmHtlc>) -> Result<EvmDraft> {
        let from = parse_address(spend.address)?;
        let (contract_address, event) = self.fund_event(spend.transaction_hash).await?;
        if let Some(htlc) = spend.htlc {
            if htlc.contract_address_bytes() != contract_address {
                return Err(SwapError::NotFound(format!(
                    "funding '{}' was not emitted by HTLC {}",
                    spend.transaction_hash,
                    htlc.contract_address()
                )));
            }
        }

        let data = match role {
            Role::Withdraw => {
                let secret = spend
                    .secret
                    .ok_or_else(|| SwapError::Value("withdraw requires a secret".to_string()))?;
                withdraw_calldata(event.locked_contract_id, secret)
            }
            Role::Refund => refund_calldata(event.locked_contract_id),
            Role::Fund => {
                return Err(SwapError::Value("fund is not a spend".to_string()));
            }
        };

        let from_hex = format!("0x{}", hex::encode(from));
        let nonce = self.client.get_transaction_count(&from_hex).await?;
        let gas_price = U256::from(self.client.gas_price().await?);

        Ok(EvmDraft {
            from,
            to: contract_address,
            value: U256::zero(),
            data,
            nonce,
            gas_price,
            gas: None,
        })
    }

    async fn estimate_fee(&self, draft: &mut EvmDraft) -> Result<u64> {
        let call = CallRequest {
            from: format!("0x{}", hex::encode(draft.from)),
            to: format!("0x{}", hex::encode(draft.to)),
            value: hex_quantity(draft.value),
            data: format!("0x{}", hex::encode(&draft.data)),
            gas_price: Some(hex_quantity(draft.gas_price)),
            nonce: Some(format!("0x{:x}", draft.nonce)),
        };
        let gas = self.client.estimate_gas(&call).await?;
        draft.gas = Some(gas);
        let fee = draft
            .gas_price
            .checked_mul(U256::from(gas))
            .and_then(|fee| u64::try_from(fee).ok())
            .ok_or_else(|| SwapError::Value("fee does not fit in u64".to_string()))?;
        Ok(fee)
    }

    fn assemble(&self, draft: EvmDraft, _fee: u64) -> Result<EvmTransaction> {
        let gas = draft.gas.ok_or(SwapError::NotBuilt)?;
        Ok(EvmTransaction {
            chain_id: self.config.chain_id,
            from: to_checksum_address(&draft.from, "0x"),
            to: to_checksum_address(&draft.to, "0x"),
            value: draft.value,
            nonce: draft.nonce,
            gas,
            gas_price: draft.gas_price,
            data: format!("0x{}", hex::encode(&draft.data)),
        })
    }

    fn sign_transaction(
        &self,
        _role: Role,
        transaction: &EvmTransaction,
        keys: &EvmKeys,
    ) -> Result<EvmSignature> {
        let from = parse_address(&transaction.from)?;
        if from != keys.address {
            return Err(SwapError::Address(format!(
                "solver key controls {}, transaction is from {}",
                self.display_address(&keys.address),
                self.display_address(&from)
            )));
        }
        sign_legacy(transaction, &keys.signing_key)
    }

    fn transaction_hash(
        &self,
        transaction: &EvmTransaction,
        signature: Option<&EvmSignature>,
    ) -> Result<String> {
        match signature {
            Some(signature) => Ok(signature.hash.clone()),
            None => Ok(format!("0x{}", hex::encode(keccak256(&unsigned_rlp(transaction)?)))),
        }
    }

    fn raw_transaction(
        &self,
        transaction: &EvmTransaction,
        signature: Option<&EvmSignature>,
    ) -> Result<String> {
        match signature {
            Some(signature) => Ok(signature.raw_transaction.clone()),
            None => Ok(format!("0x{}", hex::encode(unsigned_rlp(transaction)?))),
        }
    }

    async fn submit(&self, _transaction: &EvmTransaction, signature: &EvmSignature) -> Result<String> {
        Ok(self
            .client
            .send_raw_transaction(&signature.raw_transaction)
            .await?)
    }
}
