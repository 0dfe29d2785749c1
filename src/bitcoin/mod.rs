//! Bitcoin chain family
//!
//! HTLC outputs are P2WSH; funding inputs are P2WPKH outputs of the sender.
//! Fund transactions pay the HTLC at output 0 and change after it, spends pay
//! the whole HTLC value minus fee to one address.

pub mod htlc;
pub mod solver;
pub mod utils;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, Network, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Txid,
    Witness,
};
use chain_clients_bitcoin::EsploraClient;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::BitcoinConfig;
use crate::core::{ChainKind, Role, Spend, SwapChain};
use crate::error::{Result, SwapError};
use crate::units::{Unit, BITCOIN_UNITS};
use crate::wallet::Bip32Wallet;

pub use htlc::BitcoinHtlc;
pub use solver::{FundSolver, RefundSolver, WithdrawSolver};
pub use utils::{is_address, is_network};

use utils::{parse_address, pubkey_hash, sha256, to_network};

pub const MAINNET_BIP84: &str = "m/84'/0'/{account}'/{change}/{address}";
pub const TESTNET_BIP84: &str = "m/84'/1'/{account}'/{change}/{address}";

/// Smallest output value worth creating, in satoshis
pub const DUST: u64 = 546;

/// Placeholder length of a DER signature plus sighash byte when sizing transactions
const DUMMY_SIGNATURE_LEN: usize = 72;

// ============================================================================
// TRANSACTION TYPES
// ============================================================================

/// Previous output spent by an input, needed for segwit sighashes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinInput {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub script_pubkey: String,
}

/// Unsigned transaction as stored in transaction raws
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinTransaction {
    /// Consensus-serialized transaction without witnesses
    pub hex: String,
    pub txid: String,
    pub inputs: Vec<BitcoinInput>,
}

/// Signed transaction parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinSignature {
    pub hash: String,
    pub raw: String,
    /// Witness stack of every input, hex items
    pub witnesses: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
struct DraftInput {
    outpoint: OutPoint,
    value: u64,
    script_pubkey: ScriptBuf,
}

#[derive(Debug, Clone)]
enum DraftKind {
    /// Candidates are ordered largest first; change goes back to `change`
    Fund { amount: u64, change: ScriptBuf },
    /// Single HTLC input paying `recipient`
    Spend,
}

/// Transaction before coin selection and fee estimation
#[derive(Debug, Clone)]
pub struct BitcoinDraft {
    kind: DraftKind,
    candidates: Vec<DraftInput>,
    /// Output 0: the HTLC for a fund, the receiving address for a spend
    destination: ScriptBuf,
    lock_time: u32,
    sequence: Sequence,
    /// Witness shape of each input, used for size estimation
    dummy_witness: Vec<Vec<u8>>,
    fee_rate: f64,
    selection: Option<(usize, Vec<TxOut>)>,
}

/// Signing key plus the HTLC material a spend witness carries
pub struct BitcoinKeys {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub witness_script: Option<ScriptBuf>,
    pub secret: Option<String>,
}

impl BitcoinKeys {
    pub fn from_wallet(wallet: &Bip32Wallet) -> Self {
        Self {
            secret_key: wallet.secret_key(),
            public_key: wallet.public_key(),
            witness_script: None,
            secret: None,
        }
    }

    fn p2wpkh_script(&self) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&CompressedPublicKey(self.public_key).wpubkey_hash())
    }

    fn pubkey_hash(&self) -> [u8; 20] {
        CompressedPublicKey(self.public_key)
            .pubkey_hash()
            .to_byte_array()
    }
}

// ============================================================================
// CHAIN
// ============================================================================

#[derive(Debug, Clone)]
pub struct Bitcoin {
    config: BitcoinConfig,
    network: Network,
    client: EsploraClient,
    secp: Secp256k1<All>,
}

impl Bitcoin {
    pub fn new(config: &BitcoinConfig) -> Result<Self> {
        Ok(Self {
            network: to_network(&config.network)?,
            config: config.clone(),
            client: EsploraClient::new(&config.api_url)?,
            secp: Secp256k1::new(),
        })
    }

    pub fn config(&self) -> &BitcoinConfig {
        &self.config
    }

    pub fn client(&self) -> &EsploraClient {
        &self.client
    }

    pub fn bitcoin_network(&self) -> Network {
        self.network
    }

    /// BIP84 path template for this network
    pub fn bip44_template(&self) -> &'static str {
        match self.network {
            Network::Bitcoin => MAINNET_BIP84,
            _ => TESTNET_BIP84,
        }
    }

    /// P2WPKH address of a wallet's signing key
    pub fn wallet_address(&self, wallet: &Bip32Wallet) -> String {
        bitcoin::Address::p2wpkh(&CompressedPublicKey(wallet.public_key()), self.network).to_string()
    }

    /// Fee rate in sat/vB: the configured rate, else the API estimate for the
    /// confirmation target (or the closest slower target).
    async fn fee_rate(&self) -> Result<f64> {
        if let Some(rate) = self.config.fee_rate {
            return Ok(rate);
        }
        let estimates = self.client.get_fee_estimates().await?;
        let target = self.config.confirmation_target;
        let rate = estimates
            .iter()
            .filter_map(|(blocks, rate)| blocks.parse::<u16>().ok().map(|blocks| (blocks, *rate)))
            .filter(|(blocks, _)| *blocks >= target)
            .min_by_key(|(blocks, _)| *blocks)
            .map(|(_, rate)| rate)
            .ok_or_else(|| {
                SwapError::NotFound(format!("no fee estimate for {} blocks", target))
            })?;
        debug!("Fee rate {} sat/vB for {} blocks", rate, target);
        Ok(rate)
    }

    /// Fetches the funding transaction and locates the HTLC output.
    async fn htlc_output(
        &self,
        transaction_hash: &str,
        htlc: Option<&BitcoinHtlc>,
    ) -> Result<DraftInput> {
        let txid = Txid::from_str(transaction_hash).map_err(|_| {
            SwapError::Value(format!("invalid transaction hash '{}'", transaction_hash))
        })?;
        let hex = self
            .client
            .get_transaction_hex(transaction_hash)
            .await?
            .ok_or_else(|| SwapError::NotFound(format!("funding transaction '{}'", transaction_hash)))?;
        let bytes = hex::decode(&hex)
            .map_err(|_| SwapError::Value("funding transaction is not hex".to_string()))?;
        let funding: bitcoin::Transaction = deserialize(&bytes)
            .map_err(|e| SwapError::Value(format!("invalid funding transaction: {}", e)))?;

        let (vout, output) = match htlc {
            Some(htlc) => {
                let script_pubkey = htlc.script_pubkey();
                funding
                    .output
                    .iter()
                    .enumerate()
                    .find(|(_, output)| output.script_pubkey == script_pubkey)
                    .ok_or_else(|| {
                        SwapError::NotFound(format!(
                            "funding '{}' does not pay HTLC {}",
                            transaction_hash,
                            htlc.address()
                        ))
                    })?
            }
            None => funding
                .output
                .first()
                .filter(|output| output.script_pubkey.is_p2wsh())
                .map(|output| (0, output))
                .ok_or_else(|| {
                    SwapError::NotFound(format!(
                        "funding '{}' has no P2WSH output at index 0",
                        transaction_hash
                    ))
                })?,
        };
        info!("HTLC output {}:{} holds {} sat", txid, vout, output.value.to_sat());
        Ok(DraftInput {
            outpoint: OutPoint::new(txid, vout as u32),
            value: output.value.to_sat(),
            script_pubkey: output.script_pubkey.clone(),
        })
    }
}

// ============================================================================
// SIZING
// ============================================================================

/// Virtual size of a transaction with placeholder witnesses
fn estimated_vsize(inputs: &[DraftInput], dummy_witness: &[Vec<u8>], outputs: &[TxOut]) -> usize {
    let transaction = bitcoin::Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs
            .iter()
            .map(|input| TxIn {
                previous_output: input.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::from_slice(dummy_witness),
            })
            .collect(),
        output: outputs.to_vec(),
    };
    transaction.vsize()
}

fn fee_for(vsize: usize, fee_rate: f64) -> u64 {
    (vsize as f64 * fee_rate).ceil() as u64
}

fn p2wpkh_dummy_witness() -> Vec<Vec<u8>> {
    vec![vec![0; DUMMY_SIGNATURE_LEN], vec![0; 33]]
}

/// Witness stack of an HTLC input: withdraw takes the branch with the secret,
/// refund the empty (false) branch.
fn htlc_witness(role: Role, signature: Vec<u8>, public_key: Vec<u8>, secret: &[u8], script: &[u8]) -> Vec<Vec<u8>> {
    match role {
        Role::Withdraw => vec![signature, public_key, secret.to_vec(), vec![1], script.to_vec()],
        _ => vec![signature, public_key, Vec::new(), script.to_vec()],
    }
}

fn overflow(amount: u64, fee: u64) -> SwapError {
    SwapError::Balance(format!(
        "amount {} sat plus fee {} sat exceeds the bitcoin supply",
        amount, fee
    ))
}

fn select_fund(draft: &BitcoinDraft, amount: u64, change: &ScriptBuf) -> Result<(u64, usize, Vec<TxOut>)> {
    let htlc_output = TxOut {
        value: Amount::from_sat(amount),
        script_pubkey: draft.destination.clone(),
    };
    let mut total = 0u64;
    for (index, candidate) in draft.candidates.iter().enumerate() {
        total = total.saturating_add(candidate.value);
        let selected = &draft.candidates[..=index];

        let mut with_change = vec![
            htlc_output.clone(),
            TxOut {
                value: Amount::from_sat(0),
                script_pubkey: change.clone(),
            },
        ];
        let fee = fee_for(
            estimated_vsize(selected, &draft.dummy_witness, &with_change),
            draft.fee_rate,
        );
        let needed = amount.checked_add(fee).ok_or_else(|| overflow(amount, fee))?;
        if let Some(rest) = total.checked_sub(needed) {
            if rest > DUST {
                with_change[1].value = Amount::from_sat(rest);
                return Ok((fee, index + 1, with_change));
            }
        }

        let without_change = vec![htlc_output.clone()];
        let fee = fee_for(
            estimated_vsize(selected, &draft.dummy_witness, &without_change),
            draft.fee_rate,
        );
        let needed = amount.checked_add(fee).ok_or_else(|| overflow(amount, fee))?;
        if total >= needed {
            // Dust change is left to the miner.
            return Ok((total - amount, index + 1, without_change));
        }
    }
    Err(SwapError::Balance(format!(
        "insufficient balance: {} sat available, {} sat plus fee needed",
        total, amount
    )))
}

// ============================================================================
// SWAP CHAIN
// ============================================================================

#[async_trait(?Send)]
impl SwapChain for Bitcoin {
    type Htlc = BitcoinHtlc;
    type Amount = u64;
    type Draft = BitcoinDraft;
    type Transaction = BitcoinTransaction;
    type Signature = BitcoinSignature;
    type Keys = BitcoinKeys;

    fn kind(&self) -> ChainKind {
        ChainKind::Bitcoin
    }

    fn network(&self) -> &str {
        &self.config.network
    }

    fn units(&self) -> &'static [Unit] {
        BITCOIN_UNITS
    }

    async fn prepare_fund(&self, address: &str, htlc: &BitcoinHtlc, amount: u64) -> Result<BitcoinDraft> {
        let sender = parse_address(address, self.network)?;
        if !sender.script_pubkey().is_p2wpkh() {
            return Err(SwapError::Address(format!("'{}' is not a P2WPKH address", address)));
        }
        if pubkey_hash(&sender)? != htlc.sender_pubkey_hash_bytes() {
            return Err(SwapError::Address(format!(
                "'{}' is not the HTLC sender",
                address
            )));
        }
        if amount == 0 {
            return Err(SwapError::Value("amount must be positive".to_string()));
        }

        let mut utxos = self.client.get_address_utxos(address).await?;
        utxos.sort_by(|a, b| b.value.cmp(&a.value));
        let candidates = utxos
            .into_iter()
            .map(|utxo| {
                let txid = Txid::from_str(&utxo.txid)
                    .map_err(|_| SwapError::Value(format!("invalid UTXO txid '{}'", utxo.txid)))?;
                Ok(DraftInput {
                    outpoint: OutPoint::new(txid, utxo.vout),
                    value: utxo.value,
                    script_pubkey: sender.script_pubkey(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BitcoinDraft {
            kind: DraftKind::Fund {
                amount,
                change: sender.script_pubkey(),
            },
            candidates,
            destination: htlc.script_pubkey(),
            lock_time: 0,
            sequence: Sequence::MAX,
            dummy_witness: p2wpkh_dummy_witness(),
            fee_rate: self.fee_rate().await?,
            selection: None,
        })
    }

    async fn prepare_spend(&self, role: Role, spend: Spend<'_, BitcoinHtlc>) -> Result<BitcoinDraft> {
        let receiver = parse_address(spend.address, self.network)?;
        if role == Role::Refund && spend.htlc.is_none() {
            return Err(SwapError::Value(
                "refund requires the HTLC to set the lock time".to_string(),
            ));
        }
        if let Some(htlc) = spend.htlc {
            let expected = match role {
                Role::Withdraw => htlc.recipient_pubkey_hash_bytes(),
                _ => htlc.sender_pubkey_hash_bytes(),
            };
            if pubkey_hash(&receiver)? != expected {
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

        let input = self.htlc_output(spend.transaction_hash, spend.htlc).await?;
        let script = match spend.htlc {
            Some(htlc) => htlc.script().to_bytes(),
            // Largest possible template: a five byte lock time push.
            None => htlc::htlc_script(&[0; 32], &[0; 20], &[0; 20], u32::MAX).to_bytes(),
        };
        let secret = spend.secret.unwrap_or_default().as_bytes().to_vec();
        let dummy_witness = htlc_witness(
            role,
            vec![0; DUMMY_SIGNATURE_LEN],
            vec![0; 33],
            &secret,
            &script,
        );

        Ok(BitcoinDraft {
            kind: DraftKind::Spend,
            candidates: vec![input],
            destination: receiver.script_pubkey(),
            lock_time: match (role, spend.htlc) {
                (Role::Refund, Some(htlc)) => htlc.endtime(),
                _ => 0,
            },
            sequence: Sequence::ENABLE_LOCKTIME_NO_RBF,
            dummy_witness,
            fee_rate: self.fee_rate().await?,
            selection: None,
        })
    }

    async fn estimate_fee(&self, draft: &mut BitcoinDraft) -> Result<u64> {
        let (fee, inputs, outputs) = match &draft.kind {
            DraftKind::Fund { amount, change } => select_fund(draft, *amount, change)?,
            DraftKind::Spend => {
                let input = &draft.candidates[..1];
                let mut outputs = vec![TxOut {
                    value: Amount::from_sat(0),
                    script_pubkey: draft.destination.clone(),
                }];
                let fee = fee_for(
                    estimated_vsize(input, &draft.dummy_witness, &outputs),
                    draft.fee_rate,
                );
                let value = input[0].value;
                if fee.checked_add(DUST).map_or(true, |floor| value <= floor) {
                    return Err(SwapError::Balance(format!(
                        "HTLC value {} sat does not cover fee {} sat",
                        value, fee
                    )));
                }
                outputs[0].value = Amount::from_sat(value - fee);
                (fee, 1, outputs)
            }
        };
        debug!("Selected {} inputs, fee {} sat", inputs, fee);
        draft.selection = Some((inputs, outputs));
        Ok(fee)
    }

    fn assemble(&self, draft: BitcoinDraft, _fee: u64) -> Result<BitcoinTransaction> {
        let (count, outputs) = draft.selection.ok_or(SwapError::NotBuilt)?;
        let selected = &draft.candidates[..count];
        let transaction = bitcoin::Transaction {
            version: Version::TWO,
            lock_time: LockTime::from_consensus(draft.lock_time),
            input: selected
                .iter()
                .map(|input| TxIn {
                    previous_output: input.outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: draft.sequence,
                    witness: Witness::new(),
                })
                .collect(),
            output: outputs,
        };
        Ok(BitcoinTransaction {
            hex: serialize_hex(&transaction),
            txid: transaction.compute_txid().to_string(),
            inputs: selected
                .iter()
                .map(|input| BitcoinInput {
                    txid: input.outpoint.txid.to_string(),
                    vout: input.outpoint.vout,
                    value: input.value,
                    script_pubkey: hex::encode(input.script_pubkey.as_bytes()),
                })
                .collect(),
        })
    }

    fn sign_transaction(
        &self,
        role: Role,
        transaction: &BitcoinTransaction,
        keys: &BitcoinKeys,
    ) -> Result<BitcoinSignature> {
        let bytes = hex::decode(&transaction.hex)
            .map_err(|_| SwapError::Value("transaction hex is invalid".to_string()))?;
        let mut unsigned: bitcoin::Transaction = deserialize(&bytes)
            .map_err(|e| SwapError::Value(format!("invalid transaction: {}", e)))?;
        if unsigned.input.len() != transaction.inputs.len() {
            return Err(SwapError::Value("transaction inputs do not match their previous outputs".to_string()));
        }

        let public_key = keys.public_key.serialize().to_vec();
        let mut witnesses = Vec::with_capacity(transaction.inputs.len());
        let mut cache = SighashCache::new(&unsigned);
        for (index, input) in transaction.inputs.iter().enumerate() {
            let script_pubkey = ScriptBuf::from_bytes(
                hex::decode(&input.script_pubkey)
                    .map_err(|_| SwapError::Value("input script is not hex".to_string()))?,
            );
            let value = Amount::from_sat(input.value);

            if script_pubkey.is_p2wpkh() {
                if script_pubkey != keys.p2wpkh_script() {
                    return Err(SwapError::Address(format!(
                        "solver key does not control input {}",
                        index
                    )));
                }
                let sighash = cache
                    .p2wpkh_signature_hash(index, &script_pubkey, value, EcdsaSighashType::All)
                    .map_err(|e| SwapError::Value(e.to_string()))?;
                let signature = self.sign_digest(sighash.to_byte_array(), &keys.secret_key);
                witnesses.push(vec![signature, public_key.clone()]);
            } else if script_pubkey.is_p2wsh() && role != Role::Fund {
                let script = keys.witness_script.as_ref().ok_or_else(|| {
                    SwapError::Value("solver carries no HTLC bytecode".to_string())
                })?;
                if ScriptBuf::new_p2wsh(&script.wscript_hash()) != script_pubkey {
                    return Err(SwapError::Value(
                        "HTLC bytecode does not match the spent output".to_string(),
                    ));
                }
                let htlc = BitcoinHtlc::from_script(self.network, script.clone())?;
                let expected = match role {
                    Role::Withdraw => htlc.recipient_pubkey_hash_bytes(),
                    _ => htlc.sender_pubkey_hash_bytes(),
                };
                if keys.pubkey_hash() != expected {
                    return Err(SwapError::Address(format!(
                        "solver key is not the HTLC {}",
                        if role == Role::Withdraw { "recipient" } else { "sender" }
                    )));
                }
                let secret = match role {
                    Role::Withdraw => {
                        let secret = keys.secret.as_deref().ok_or_else(|| {
                            SwapError::Value("withdraw requires a secret".to_string())
                        })?;
                        if sha256(secret.as_bytes()) != htlc.secret_hash_bytes() {
                            return Err(SwapError::Value(
                                "secret does not match the HTLC secret hash".to_string(),
                            ));
                        }
                        secret.as_bytes().to_vec()
                    }
                    _ => Vec::new(),
                };
                let sighash = cache
                    .p2wsh_signature_hash(index, script, value, EcdsaSighashType::All)
                    .map_err(|e| SwapError::Value(e.to_string()))?;
                let signature = self.sign_digest(sighash.to_byte_array(), &keys.secret_key);
                witnesses.push(htlc_witness(
                    role,
                    signature,
                    public_key.clone(),
                    &secret,
                    script.as_bytes(),
                ));
            } else {
                return Err(SwapError::Value(format!(
                    "input {} cannot be signed for a {} transaction",
                    index, role
                )));
            }
        }

        for (input, witness) in unsigned.input.iter_mut().zip(&witnesses) {
            input.witness = Witness::from_slice(witness);
        }
        Ok(BitcoinSignature {
            hash: unsigned.compute_txid().to_string(),
            raw: serialize_hex(&unsigned),
            witnesses: witnesses
                .iter()
                .map(|stack| stack.iter().map(hex::encode).collect())
                .collect(),
        })
    }

    fn transaction_hash(
        &self,
        transaction: &BitcoinTransaction,
        signature: Option<&BitcoinSignature>,
    ) -> Result<String> {
        Ok(match signature {
            Some(signature) => signature.hash.clone(),
            None => transaction.txid.clone(),
        })
    }

    fn raw_transaction(
        &self,
        transaction: &BitcoinTransaction,
        signature: Option<&BitcoinSignature>,
    ) -> Result<String> {
        Ok(match signature {
            Some(signature) => signature.raw.clone(),
            None => transaction.hex.clone(),
        })
    }

    async fn submit(&self, _transaction: &BitcoinTransaction, signature: &BitcoinSignature) -> Result<String> {
        Ok(self.client.broadcast(&signature.raw).await?)
    }
}

impl Bitcoin {
    /// DER signature with the SIGHASH_ALL byte appended
    fn sign_digest(&self, digest: [u8; 32], secret_key: &SecretKey) -> Vec<u8> {
        let message = Message::from_digest(digest);
        let signature = self.secp.sign_ecdsa(&message, secret_key);
        bitcoin::ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        }
        .to_vec()
    }
}
