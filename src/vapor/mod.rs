//! Vapor chain family
//!
//! Transactions are assembled by the blockcenter from spend/control actions;
//! this side only signs the returned `sign_data` with chainkd keys. The HTLC
//! input of a spend is always the first signing instruction.

pub mod chainkd;
pub mod htlc;
pub mod solver;
pub mod utils;
pub mod wallet;

use async_trait::async_trait;
use chain_clients_vapor::{
    control_address_action, spend_utxo_action, spend_wallet_action, BlockcenterClient,
    BuiltTransaction, SigningInstruction, TransactionOutput,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::VaporConfig;
use crate::core::{ChainKind, Role, Spend, SwapChain, Transaction};
use crate::error::{Result, SwapError};
use crate::units::{Unit, VAPOR_UNITS};

pub use htlc::VaporHtlc;
pub use solver::{FundSolver, RefundSolver, WithdrawSolver};
pub use utils::{is_address, is_network};
pub use wallet::VaporWallet;

use chainkd::{path_from_indexes, XPrv};
use utils::public_key_address;

pub const VAPOR_BIP44: &str = "m/44/153/{account}/{change}/{address}";

/// Native BTM asset id
pub const BTM_ASSET: &str = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

// ============================================================================
// TRANSACTION TYPES
// ============================================================================

/// Blockcenter-built transaction as stored in transaction raws
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaporTransaction {
    /// Wallet address the transaction was built for
    pub address: String,
    pub hash: String,
    pub raw: String,
    pub signing_instructions: Vec<SigningInstruction>,
}

/// Arguments of every input, signatures included, in input order
pub type VaporSignature = Vec<Vec<String>>;

/// What the holder of one input must sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedData {
    pub datas: Vec<String>,
    pub public_key: Option<String>,
    pub address: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VaporDraft {
    address: String,
    built: BuiltTransaction,
}

/// Root key (for blockcenter derivation paths), the signing key and the HTLC
/// material a spend carries
pub struct VaporKeys {
    pub root: XPrv,
    pub key: XPrv,
    pub bytecode: Option<Vec<u8>>,
    pub secret: Option<String>,
}

impl VaporTransaction {
    /// Data to sign per input, with derivation paths resolved
    pub fn unsigned_datas(&self, network: &str) -> Result<Vec<UnsignedData>> {
        self.signing_instructions
            .iter()
            .map(|instruction| {
                let public_key = instruction.pubkey.clone();
                let address = match &public_key {
                    Some(key) => Some(public_key_address(&htlc::parse_public_key(key)?, network)?),
                    None => None,
                };
                let path = match &instruction.derivation_path {
                    Some(indexes) if !indexes.is_empty() => Some(path_from_indexes(indexes)?.0),
                    _ => None,
                };
                Ok(UnsignedData {
                    datas: instruction.sign_data.clone(),
                    public_key,
                    address,
                    path,
                })
            })
            .collect()
    }
}

impl Transaction<Vapor> {
    pub fn unsigned_datas(&self) -> Result<Vec<UnsignedData>> {
        self.json()?.unsigned_datas(self.network())
    }
}

// ============================================================================
// CHAIN
// ============================================================================

#[derive(Debug, Clone)]
pub struct Vapor {
    config: VaporConfig,
    client: BlockcenterClient,
}

impl Vapor {
    pub fn new(config: &VaporConfig) -> Result<Self> {
        if !is_network(&config.network) {
            return Err(SwapError::Network(format!(
                "unknown vapor network '{}'",
                config.network
            )));
        }
        Ok(Self {
            config: config.clone(),
            client: BlockcenterClient::new(&config.api_url)?,
        })
    }

    pub fn config(&self) -> &VaporConfig {
        &self.config
    }

    pub fn client(&self) -> &BlockcenterClient {
        &self.client
    }

    pub fn bip44_template(&self) -> &'static str {
        VAPOR_BIP44
    }

    fn check_address(&self, address: &str) -> Result<()> {
        if !is_address(address, Some(&self.config.network)) {
            return Err(SwapError::Address(format!(
                "invalid {} vapor address '{}'",
                self.config.network, address
            )));
        }
        Ok(())
    }

    fn key_address(&self, public_key: &[u8; 32]) -> Result<String> {
        public_key_address(public_key, &self.config.network)
    }

    /// Fetches the funding transaction and locates the HTLC output.
    async fn htlc_output(
        &self,
        transaction_hash: &str,
        htlc: Option<&VaporHtlc>,
    ) -> Result<TransactionOutput> {
        let funding = self
            .client
            .get_transaction(transaction_hash)
            .await?
            .ok_or_else(|| SwapError::NotFound(format!("funding transaction '{}'", transaction_hash)))?;
        let control_program = htlc.map(VaporHtlc::control_program);
        let output = funding
            .outputs
            .into_iter()
            .find(|output| match &control_program {
                Some(program) => output.script == *program,
                None => output.script.len() == 68 && output.script.starts_with("0020"),
            })
            .ok_or_else(|| {
                SwapError::NotFound(format!(
                    "no HTLC output in funding transaction '{}'",
                    transaction_hash
                ))
            })?;
        info!("HTLC output {} holds {} of {}", output.utxo_id, output.amount, output.asset);
        Ok(output)
    }
}

fn decode_sign_data(data: &str) -> Result<Vec<u8>> {
    hex::decode(data).map_err(|_| SwapError::Value(format!("invalid sign data '{}'", data)))
}

fn sign_all(key: &XPrv, instruction: &SigningInstruction) -> Result<Vec<String>> {
    instruction
        .sign_data
        .iter()
        .map(|data| Ok(hex::encode(key.sign(&decode_sign_data(data)?)?)))
        .collect()
}

// ============================================================================
// SWAP CHAIN
// ============================================================================

#[async_trait(?Send)]
impl SwapChain for Vapor {
    type Htlc = VaporHtlc;
    type Amount = u64;
    type Draft = VaporDraft;
    type Transaction = VaporTransaction;
    type Signature = VaporSignature;
    type Keys = VaporKeys;

    fn kind(&self) -> ChainKind {
        ChainKind::Vapor
    }

    fn network(&self) -> &str {
        &self.config.network
    }

    fn units(&self) -> &'static [Unit] {
        VAPOR_UNITS
    }

    async fn prepare_fund(&self, address: &str, htlc: &VaporHtlc, amount: u64) -> Result<VaporDraft> {
        self.check_address(address)?;
        if self.key_address(&htlc.sender_public_key_bytes())? != address {
            return Err(SwapError::Address(format!("'{}' is not the HTLC sender", address)));
        }
        if amount == 0 {
            return Err(SwapError::Value("amount must be positive".to_string()));
        }
        let asset = &self.config.asset;
        let built = self
            .client
            .build_transaction(
                address,
                vec![spend_wallet_action(asset, amount)],
                vec![control_address_action(asset, amount, &htlc.address()?)],
                self.config.fee,
                self.config.confirmations,
            )
            .await?;
        Ok(VaporDraft {
            address: address.to_string(),
            built,
        })
    }

    async fn prepare_spend(&self, role: Role, spend: Spend<'_, VaporHtlc>) -> Result<VaporDraft> {
        self.check_address(spend.address)?;
        if let Some(htlc) = spend.htlc {
            let expected = match role {
                Role::Withdraw => htlc.recipient_public_key_bytes(),
                _ => htlc.sender_public_key_bytes(),
            };
            if self.key_address(&expected)? != spend.address {
                return Err(SwapError::Address(format!(
                    "'{}' is not the HTLC {}",
                    spend.address,
                    if role == Role::Withdraw { "recipient" } else { "sender" }
                )));
            }
            if let Some(secret) = spend.secret {
                if !htlc.matches_secret(secret) {
                    return Err(SwapError::Value("secret does not match the HTLC secret hash".to_string()));
                }
            }
        }

        let output = self.htlc_output(spend.transaction_hash, spend.htlc).await?;
        let built = self
            .client
            .build_transaction(
                spend.address,
                vec![spend_utxo_action(&output.utxo_id)],
                vec![control_address_action(&output.asset, output.amount, spend.address)],
                self.config.fee,
                self.config.confirmations,
            )
            .await?;
        Ok(VaporDraft {
            address: spend.address.to_string(),
            built,
        })
    }

    async fn estimate_fee(&self, draft: &mut VaporDraft) -> Result<u64> {
        Ok(draft.built.fee)
    }

    fn assemble(&self, draft: VaporDraft, _fee: u64) -> Result<VaporTransaction> {
        Ok(VaporTransaction {
            address: draft.address,
            hash: draft.built.tx.hash,
            raw: draft.built.raw_transaction,
            signing_instructions: draft.built.signing_instructions,
        })
    }

    fn sign_transaction(
        &self,
        role: Role,
        transaction: &VaporTransaction,
        keys: &VaporKeys,
    ) -> Result<VaporSignature> {
        let mut signatures = Vec::with_capacity(transaction.signing_instructions.len());
        for (index, instruction) in transaction.signing_instructions.iter().enumerate() {
            if index == 0 && role != Role::Fund {
                let bytecode = keys.bytecode.as_ref().ok_or_else(|| {
                    SwapError::Value("solver carries no HTLC bytecode".to_string())
                })?;
                let htlc = VaporHtlc::from_program(&self.config.network, bytecode)?;
                let expected = match role {
                    Role::Withdraw => htlc.recipient_public_key_bytes(),
                    _ => htlc.sender_public_key_bytes(),
                };
                if keys.key.public_key() != expected {
                    return Err(SwapError::Address(format!(
                        "solver key is not the HTLC {}",
                        if role == Role::Withdraw { "recipient" } else { "sender" }
                    )));
                }

                let mut arguments = Vec::new();
                if role == Role::Withdraw {
                    let secret = keys
                        .secret
                        .as_deref()
                        .ok_or_else(|| SwapError::Value("withdraw requires a secret".to_string()))?;
                    if !htlc.matches_secret(secret) {
                        return Err(SwapError::Value(
                            "secret does not match the HTLC secret hash".to_string(),
                        ));
                    }
                    arguments.push(hex::encode(secret.as_bytes()));
                }
                arguments.extend(sign_all(&keys.key, instruction)?);
                arguments.push(if role == Role::Withdraw { "00" } else { "01" }.to_string());
                arguments.push(hex::encode(bytecode));
                signatures.push(arguments);
                continue;
            }

            let key = match &instruction.derivation_path {
                Some(indexes) if !indexes.is_empty() => {
                    keys.root.derive(&path_from_indexes(indexes)?.1)
                }
                _ => keys.key.clone(),
            };
            signatures.push(sign_all(&key, instruction)?);
        }
        Ok(signatures)
    }

    fn transaction_hash(
        &self,
        transaction: &VaporTransaction,
        _signature: Option<&VaporSignature>,
    ) -> Result<String> {
        Ok(transaction.hash.clone())
    }

    fn raw_transaction(
        &self,
        transaction: &VaporTransaction,
        _signature: Option<&VaporSignature>,
    ) -> Result<String> {
        Ok(transaction.raw.clone())
    }

    async fn submit(&self, transaction: &VaporTransaction, signature: &VaporSignature) -> Result<String> {
        Ok(self
            .client
            .submit_payment(&transaction.address, &transaction.raw, signature)
            .await?)
    }
}
