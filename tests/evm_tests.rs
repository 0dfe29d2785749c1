//! Tests for the EVM fund, withdraw and refund transactions

#[path = "helpers.rs"]
mod test_helpers;

use bitcoin::NetworkKind;
use ethereum_types::U256;
use k256::ecdsa::SigningKey;
use serde_json::json;
use swap::evm::abi::{event_topic, selector};
use swap::evm::htlc::{LOG_FUND_SIGNATURE, WITHDRAW_SIGNATURE};
use swap::evm::{sign_legacy, EvmTransaction, FundSolver, RefundSolver, WithdrawSolver};
use swap::{
    Bip32Wallet, Evm, EvmConfig, EvmHtlc, FundTransaction, RefundTransaction, Signature, SwapError,
    Transaction, WithdrawTransaction,
};
use test_helpers::*;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// MOCKS
// ============================================================================

async fn mount_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(result)))
        .mount(server)
        .await;
}

/// Nonce 5, gas price 1 Gwei, gas estimate 100000
async fn mount_gas(server: &MockServer) {
    mount_rpc(server, "eth_getTransactionCount", json!("0x5")).await;
    mount_rpc(server, "eth_gasPrice", json!("0x3b9aca00")).await;
    mount_rpc(server, "eth_estimateGas", json!("0x186a0")).await;
}

fn word(hex_body: &str) -> String {
    format!("{:0>64}", hex_body)
}

/// Receipt whose first log is `log_fund` locking the all-`abandon` HTLC
async fn mount_funding_receipt(server: &MockServer, recipient: &str, sender: &str) {
    let strip = |address: &str| address.trim_start_matches("0x").to_lowercase();
    let data = format!(
        "0x{}{}{}",
        secret_hash(),
        word("de0b6b3a7640000"),
        word(&format!("{:x}", 1_700_000_000u64))
    );
    let receipt = json!({
        "transactionHash": DUMMY_TX_HASH_EVM,
        "contractAddress": null,
        "status": "0x1",
        "logs": [{
            "address": DUMMY_CONTRACT_ADDR_EVM,
            "topics": [
                format!("0x{}", hex::encode(event_topic(LOG_FUND_SIGNATURE))),
                DUMMY_LOCKED_CONTRACT_ID,
                format!("0x{}", word(&strip(recipient))),
                format!("0x{}", word(&strip(sender))),
            ],
            "data": data
        }]
    });
    mount_rpc(server, "eth_getTransactionReceipt", receipt).await;
}

fn abandon_htlc(chain: &Evm) -> EvmHtlc {
    EvmHtlc::new(chain)
        .unwrap()
        .build_htlc(
            &secret_hash(),
            DUMMY_RECIPIENT_ADDR_EVM,
            ABANDON_ETHEREUM_ADDRESS,
            1_700_000_000,
        )
        .unwrap()
}

// ============================================================================
// SIGNING VECTORS
// ============================================================================

/// 1. Test: EIP-155 Signing Vector
/// Verifies legacy signing against the example transaction of EIP-155.
#[test]
fn test_eip155_vector() {
    let transaction = EvmTransaction {
        chain_id: 1,
        from: "0x0000000000000000000000000000000000000000".to_string(),
        to: "0x3535353535353535353535353535353535353535".to_string(),
        value: U256::from(1_000_000_000_000_000_000u64),
        nonce: 9,
        gas: 21_000,
        gas_price: U256::from(20_000_000_000u64),
        data: "0x".to_string(),
    };
    let signing_key = SigningKey::from_slice(&[0x46; 32]).unwrap();
    let signature = sign_legacy(&transaction, &signing_key).unwrap();

    assert_eq!(signature.v, 37);
    assert_eq!(
        signature.raw_transaction,
        "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
    );
}

/// 2. Test: BIP44 Ethereum Address
/// Verifies that the all-`abandon` mnemonic derives its well-known first address.
#[test]
fn test_bip44_address() {
    let chain = Evm::ethereum(&evm_config("http://127.0.0.1:1")).unwrap();
    let wallet = Bip32Wallet::from_mnemonic(ABANDON_MNEMONIC, "", NetworkKind::Main)
        .unwrap()
        .from_path("m/44'/60'/0'/0/0")
        .unwrap();
    assert_eq!(chain.wallet_address(&wallet).unwrap(), ABANDON_ETHEREUM_ADDRESS);
}

// ============================================================================
// FUND
// ============================================================================

/// 3. Test: Fund Build, Sign And Façade
/// Verifies the fund flow and that signing the unsigned raw through the
/// Signature façade yields the same signed raw as the builder.
#[tokio::test]
async fn test_fund_build_and_sign() {
    init_tracing();
    let mock_server = MockServer::start().await;
    mount_gas(&mock_server).await;

    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let htlc = abandon_htlc(&chain);
    let mut fund = FundTransaction::new(chain.clone());
    fund.build_transaction(
        ABANDON_ETHEREUM_ADDRESS,
        &htlc,
        U256::from(1_000_000_000_000_000u64),
    )
    .await
    .unwrap();

    assert_eq!(fund.fee().unwrap(), 100_000_000_000_000);
    assert_eq!(fund.fee_in("Gwei").unwrap(), 100_000.0);
    let json = fund.json().unwrap();
    assert_eq!(json.nonce, 5);
    assert_eq!(json.gas, 100_000);
    assert_eq!(json.from, ABANDON_ETHEREUM_ADDRESS);
    assert_eq!(json.to.to_lowercase(), DUMMY_CONTRACT_ADDR_EVM);
    assert_eq!(fund.kind().unwrap(), "ethereum_fund_unsigned");
    assert!(fund.signature().unwrap().is_none());

    let unsigned_raw = fund.transaction_raw().unwrap();
    let solver = FundSolver::new(&abandon_xprivate_key());
    fund.sign(&solver).unwrap();
    assert_eq!(fund.kind().unwrap(), "ethereum_fund_signed");
    assert!(fund.raw().unwrap().starts_with("0xf8"));

    let mut signature = Signature::new(chain.clone());
    signature.sign(&unsigned_raw, &solver).unwrap();
    assert_eq!(signature.transaction_raw().unwrap(), fund.transaction_raw().unwrap());
    assert_eq!(signature.hash().unwrap(), fund.hash().unwrap());
    assert_eq!(signature.fee().unwrap(), fund.fee().unwrap());

    // The signed raw restores the same transaction.
    let restored = Transaction::from_raw(chain, &fund.transaction_raw().unwrap()).unwrap();
    assert_eq!(restored.json().unwrap(), fund.json().unwrap());
    assert!(restored.is_signed());
}

/// 4. Test: Fund From Non-Sender
/// Verifies that only the HTLC sender can fund it.
#[tokio::test]
async fn test_fund_requires_sender() {
    let mock_server = MockServer::start().await;
    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let htlc = abandon_htlc(&chain);
    let mut fund = FundTransaction::new(chain);
    let err = fund
        .build_transaction(DUMMY_RECIPIENT_ADDR_EVM, &htlc, U256::from(1u64))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SwapError::Address(_)));
    assert!(matches!(fund.fee(), Err(SwapError::NotBuilt)));
}

/// 5. Test: Solver Key Must Control The Sender
/// Verifies that signing with a key for another address fails.
#[tokio::test]
async fn test_fund_sign_with_other_key() {
    let mock_server = MockServer::start().await;
    mount_gas(&mock_server).await;

    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let htlc = abandon_htlc(&chain);
    let mut fund = FundTransaction::new(chain);
    fund.build_transaction(ABANDON_ETHEREUM_ADDRESS, &htlc, U256::from(10u64))
        .await
        .unwrap();
    let solver = FundSolver::new(&abandon_xprivate_key()).with_indexes(0, false, 1);
    assert!(matches!(fund.sign(&solver), Err(SwapError::Address(_))));
    assert!(!fund.is_signed());
}

/// 6. Test: XinFin Fund With xdc Addresses
/// Verifies a fund on the XinFin apothem network: xdc-prefixed addresses are
/// accepted and displayed, and the signature is replay protected for chain 51.
#[tokio::test]
async fn test_xinfin_fund_build_and_sign() {
    let mock_server = MockServer::start().await;
    mount_gas(&mock_server).await;

    let chain = Evm::xinfin(&EvmConfig {
        network: "apothem".to_string(),
        chain_id: 51,
        ..evm_config(&mock_server.uri())
    })
    .unwrap();
    let wallet = Bip32Wallet::from_mnemonic(ABANDON_MNEMONIC, "", NetworkKind::Main)
        .unwrap()
        .from_path("m/44'/550'/0'/0/0")
        .unwrap();
    let sender = chain.wallet_address(&wallet).unwrap();
    assert!(sender.starts_with("xdc"));
    assert_eq!(sender.len(), 43);

    let recipient = format!("xdc{}", DUMMY_RECIPIENT_ADDR_EVM.trim_start_matches("0x"));
    let htlc = EvmHtlc::new(&chain)
        .unwrap()
        .build_htlc(&secret_hash(), &recipient, &sender, 1_700_000_000)
        .unwrap();
    assert_eq!(htlc.sender_address().unwrap(), sender);
    assert_eq!(htlc.recipient_address().unwrap(), recipient);
    assert!(htlc.contract_address().starts_with("xdc"));

    let mut fund = FundTransaction::new(chain.clone());
    fund.build_transaction(&sender, &htlc, U256::from(1_000_000_000_000_000u64))
        .await
        .unwrap();
    let json = fund.json().unwrap();
    assert_eq!(json.chain_id, 51);
    assert_eq!(json.from[2..], sender[3..]);
    assert_eq!(fund.kind().unwrap(), "xinfin_fund_unsigned");

    fund.sign(&FundSolver::new(&abandon_xprivate_key())).unwrap();
    assert_eq!(fund.kind().unwrap(), "xinfin_fund_signed");
    let v = fund.signature().unwrap().unwrap().v;
    assert!(v == 137 || v == 138);

    let restored = Transaction::from_raw(chain, &fund.transaction_raw().unwrap()).unwrap();
    assert_eq!(restored.hash().unwrap(), fund.hash().unwrap());
}

// ============================================================================
// WITHDRAW AND REFUND
// ============================================================================

/// 7. Test: Withdraw From Funding Receipt
/// Verifies that the locked contract id is read from the funding `log_fund`
/// event and the withdraw call carries the secret.
#[tokio::test]
async fn test_withdraw_build_and_sign() {
    init_tracing();
    let mock_server = MockServer::start().await;
    mount_gas(&mock_server).await;
    mount_funding_receipt(&mock_server, ABANDON_ETHEREUM_ADDRESS, DUMMY_RECIPIENT_ADDR_EVM).await;

    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let mut withdraw = WithdrawTransaction::new(chain.clone());
    withdraw
        .build_transaction(DUMMY_TX_HASH_EVM, ABANDON_ETHEREUM_ADDRESS, SECRET, None)
        .await
        .unwrap();

    let json = withdraw.json().unwrap();
    assert!(json.value.is_zero());
    assert!(json
        .data
        .starts_with(&format!("0x{}", hex::encode(selector(WITHDRAW_SIGNATURE)))));
    assert!(json.data.contains(DUMMY_LOCKED_CONTRACT_ID.trim_start_matches("0x")));
    assert!(json.data.contains(&hex::encode(SECRET)));

    withdraw
        .sign(&WithdrawSolver::new(&abandon_xprivate_key()))
        .unwrap();
    assert_eq!(withdraw.kind().unwrap(), "ethereum_withdraw_signed");
}

/// 8. Test: Withdraw With Wrong Secret
/// Verifies that a withdraw the contract would revert fails at gas estimation
/// with the node's reason and leaves the transaction unbuilt.
#[tokio::test]
async fn test_withdraw_wrong_secret() {
    let mock_server = MockServer::start().await;
    mount_rpc(&mock_server, "eth_getTransactionCount", json!("0x5")).await;
    mount_rpc(&mock_server, "eth_gasPrice", json!("0x3b9aca00")).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_estimateGas"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "execution reverted: hashlock hash does not match"}
        })))
        .mount(&mock_server)
        .await;
    mount_funding_receipt(&mock_server, ABANDON_ETHEREUM_ADDRESS, DUMMY_RECIPIENT_ADDR_EVM).await;

    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let mut withdraw = WithdrawTransaction::new(chain);
    let err = withdraw
        .build_transaction(DUMMY_TX_HASH_EVM, ABANDON_ETHEREUM_ADDRESS, "Wrong Secret!", None)
        .await
        .err()
        .unwrap();
    match err {
        SwapError::Api { reason, code } => {
            assert!(reason.starts_with("execution reverted"));
            assert_eq!(code, Some(-32000));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(matches!(withdraw.fee(), Err(SwapError::NotBuilt)));
}

/// 9. Test: HTLC From Funding Transaction
/// Verifies that the agreement is reconstructed from the funding receipt.
#[tokio::test]
async fn test_htlc_from_funding_transaction() {
    let mock_server = MockServer::start().await;
    mount_funding_receipt(&mock_server, DUMMY_RECIPIENT_ADDR_EVM, ABANDON_ETHEREUM_ADDRESS).await;

    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let htlc = EvmHtlc::from_funding_transaction(&chain, DUMMY_TX_HASH_EVM)
        .await
        .unwrap();
    assert_eq!(htlc.secret_hash().unwrap(), secret_hash());
    assert_eq!(htlc.sender_address().unwrap(), ABANDON_ETHEREUM_ADDRESS);
    assert_eq!(htlc.endtime(), Some(1_700_000_000));
    assert_eq!(htlc.locked_contract_id().unwrap(), DUMMY_LOCKED_CONTRACT_ID);
}

/// 10. Test: Wrong Solver Role
/// Verifies that a refund cannot be signed with a withdraw solver and the error
/// names both solver types.
#[tokio::test]
async fn test_refund_wrong_solver() {
    let mock_server = MockServer::start().await;
    mount_gas(&mock_server).await;
    mount_funding_receipt(&mock_server, DUMMY_RECIPIENT_ADDR_EVM, ABANDON_ETHEREUM_ADDRESS).await;

    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let mut refund = RefundTransaction::new(chain);
    refund
        .build_transaction(DUMMY_TX_HASH_EVM, ABANDON_ETHEREUM_ADDRESS, None)
        .await
        .unwrap();

    let err = refund
        .sign(&WithdrawSolver::new(&abandon_xprivate_key()))
        .err()
        .unwrap();
    match err {
        SwapError::Type { expected, actual } => {
            assert_eq!(expected, "RefundSolver");
            assert_eq!(actual, "WithdrawSolver");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    refund.sign(&RefundSolver::new(&abandon_xprivate_key())).unwrap();
    assert!(matches!(
        refund.sign(&RefundSolver::new(&abandon_xprivate_key())),
        Err(SwapError::AlreadySigned)
    ));
}

/// 11. Test: Unbuilt Transactions
/// Verifies that accessors fail with NotBuilt for every role.
#[test]
fn test_not_built() {
    let chain = Evm::xinfin(&evm_config("http://127.0.0.1:1")).unwrap();
    let fund = FundTransaction::new(chain.clone());
    let withdraw = WithdrawTransaction::new(chain.clone());
    let refund = RefundTransaction::new(chain);
    for transaction in [fund.into_inner(), withdraw.into_inner(), refund.into_inner()] {
        assert!(matches!(transaction.fee(), Err(SwapError::NotBuilt)));
        assert!(matches!(transaction.hash(), Err(SwapError::NotBuilt)));
        assert!(matches!(transaction.raw(), Err(SwapError::NotBuilt)));
        assert!(matches!(transaction.transaction_raw(), Err(SwapError::NotBuilt)));
    }
}

// ============================================================================
// SUBMIT
// ============================================================================

/// 12. Test: Node Rejection
/// Verifies that a JSON-RPC error on submission surfaces as an Api error with
/// the node's reason.
#[tokio::test]
async fn test_submit_rejected() {
    let mock_server = MockServer::start().await;
    mount_gas(&mock_server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "nonce too low"}
        })))
        .mount(&mock_server)
        .await;

    let chain = Evm::ethereum(&evm_config(&mock_server.uri())).unwrap();
    let htlc = abandon_htlc(&chain);
    let mut fund = FundTransaction::new(chain.clone());
    fund.build_transaction(ABANDON_ETHEREUM_ADDRESS, &htlc, U256::from(10u64))
        .await
        .unwrap();
    fund.sign(&FundSolver::new(&abandon_xprivate_key())).unwrap();

    let err = swap::submit_transaction_raw(chain, &fund.transaction_raw().unwrap())
        .await
        .unwrap_err();
    match err {
        SwapError::Api { reason, code } => {
            assert_eq!(reason, "nonce too low");
            assert_eq!(code, Some(-32000));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
