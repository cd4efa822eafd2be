//! End-to-end transaction dispatch against a scripted node and wallet.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{alice, alice_wallet, harness, test_config, NODE_NONCE, NOW_MS};
use near_relay_client::config::ClientConfig;
use near_relay_client::rpc::RpcError;
use near_relay_client::{Action, ClientError, SendTxRequest, SigningPath, TxStatus};

fn increment() -> SendTxRequest {
    SendTxRequest::new("app.near", vec![Action::function_call("increment", json!({}))])
}

#[tokio::test]
async fn test_local_signing_end_to_end() {
    let h = alice(None).await;

    let mut dispatched = h.client.send_tx(increment()).await.unwrap();
    assert_eq!(dispatched.path, SigningPath::Local);
    assert_eq!(h.transport.calls("query:view_access_key"), 1);
    assert_eq!(h.transport.calls("block"), 1);
    assert_eq!(h.transport.calls("send_tx"), 1);

    let included = h.client.tx(&dispatched.tx_id).unwrap();
    assert_eq!(included.status, TxStatus::Included);
    assert!(!included.final_state);
    assert!(included.tx_hash.is_some());
    assert!(included.signature.is_some());
    assert!(included.signed_tx_base64.is_some());
    let tx = included.tx.unwrap();
    assert_eq!(tx["nonce"], json!(NODE_NONCE + 1));
    assert_eq!(tx["signerId"], "alice.near");
    assert_eq!(tx["receiverId"], "app.near");
    assert_eq!(tx["blockHash"], common::block_hash());

    dispatched.settle().await;
    assert_eq!(h.transport.calls("tx"), 1);

    let done = h.client.tx(&dispatched.tx_id).unwrap();
    assert_eq!(done.status, TxStatus::Executed);
    assert!(done.final_state);
    assert_eq!(done.success_value, Some(json!("done")));
}

#[tokio::test]
async fn test_transfer_with_deposit_goes_through_wallet() {
    let h = alice(Some(json!({"rejected": true}))).await;
    let signed_in_posts = h.surface.posted().len();

    let request = SendTxRequest::new("app.near", vec![Action::transfer(1)]);
    let dispatched = h.client.send_tx(request).await.unwrap();

    assert_eq!(dispatched.path, SigningPath::Relay);
    assert_eq!(h.transport.calls("query:view_access_key"), 0);
    assert_eq!(h.transport.calls("block"), 0);
    assert_eq!(h.transport.calls("send_tx"), 0);
    assert_eq!(h.surface.posted_count("sendTransactions"), 1);

    let posted = h.surface.posted();
    let envelope = &posted[signed_in_posts];
    let tx = &envelope.params["transactions"][0];
    assert_eq!(tx["signerId"], "alice.near");
    assert_eq!(tx["receiverId"], "app.near");
    assert_eq!(tx["actions"][0]["type"], "Transfer");

    let record = h.client.tx(&dispatched.tx_id).unwrap();
    assert_eq!(record.status, TxStatus::RejectedByUser);
    assert!(record.final_state);
}

#[tokio::test]
async fn test_nonce_increments_without_refetch() {
    let h = alice(None).await;

    let mut first = h.client.send_tx(increment()).await.unwrap();
    let mut second = h.client.send_tx(increment()).await.unwrap();
    first.settle().await;
    second.settle().await;

    assert_eq!(h.transport.calls("query:view_access_key"), 1);
    let n1 = h.client.tx(&first.tx_id).unwrap().tx.unwrap()["nonce"].as_u64().unwrap();
    let n2 = h.client.tx(&second.tx_id).unwrap().tx.unwrap()["nonce"].as_u64().unwrap();
    assert_eq!(n1, NODE_NONCE + 1);
    assert_eq!(n2, n1 + 1);
}

#[tokio::test]
async fn test_concurrent_dispatches_reserve_distinct_nonces() {
    let h = alice(None).await;

    let (a, b) = tokio::join!(h.client.send_tx(increment()), h.client.send_tx(increment()));
    let (mut a, mut b) = (a.unwrap(), b.unwrap());
    a.settle().await;
    b.settle().await;

    let nonce = |tx_id: &str| h.client.tx(tx_id).unwrap().tx.unwrap()["nonce"].as_u64().unwrap();
    let mut nonces = vec![nonce(&a.tx_id), nonce(&b.tx_id)];
    nonces.sort_unstable();
    assert_eq!(nonces, vec![NODE_NONCE + 1, NODE_NONCE + 2]);
    assert_eq!(h.transport.calls("query:view_access_key"), 1);
    assert_eq!(h.transport.calls("send_tx"), 2);
}

#[tokio::test]
async fn test_block_reused_until_stale() {
    let h = alice(None).await;

    h.client.send_tx(increment()).await.unwrap().settle().await;
    h.clock.advance_ms(60 * 60 * 1_000);
    h.client.send_tx(increment()).await.unwrap().settle().await;
    assert_eq!(h.transport.calls("block"), 1);

    // Past the six hour window
    h.clock.advance_ms(5 * 60 * 60 * 1_000 + 1);
    h.transport.set_block_time_ms(NOW_MS + 6 * 60 * 60 * 1_000);
    h.client.send_tx(increment()).await.unwrap().settle().await;
    assert_eq!(h.transport.calls("block"), 2);
}

#[tokio::test]
async fn test_other_contract_goes_through_wallet() {
    let h = alice(Some(json!({"outcomes": [{"transaction": {"hash": "abc"}, "status": {"SuccessValue": ""}}]}))).await;

    let request = SendTxRequest::new("other.near", vec![Action::function_call("go", json!({}))]);
    let dispatched = h.client.send_tx(request).await.unwrap();

    assert_eq!(dispatched.path, SigningPath::Relay);
    assert_eq!(h.transport.total_calls(), 0);
    let record = h.client.tx(&dispatched.tx_id).unwrap();
    assert_eq!(record.status, TxStatus::Executed);
    assert_eq!(record.tx_hash.as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_attached_deposit_goes_through_wallet() {
    let h = alice(Some(json!({"outcomes": [{"transaction": {"hash": "h1"}}]}))).await;

    let action = Action::function_call("buy", json!({})).with_deposit(10);
    let dispatched = h
        .client
        .send_tx(SendTxRequest::new("app.near", vec![action]))
        .await
        .unwrap();

    assert_eq!(dispatched.path, SigningPath::Relay);
    assert_eq!(h.transport.total_calls(), 0);
}

#[tokio::test]
async fn test_signed_out_send_is_unauthenticated() {
    let h = harness(test_config(), alice_wallet(None)).await;

    let result = h.client.send_tx(increment()).await;
    assert!(matches!(result, Err(ClientError::Unauthenticated)));
    assert!(h.client.history().is_empty());
    assert_eq!(h.transport.total_calls(), 0);
}

#[tokio::test]
async fn test_access_key_failure_marks_record() {
    let h = alice(None).await;
    h.transport.respond(
        "query:view_access_key",
        Err(RpcError::Node(json!({"name": "UNKNOWN_ACCESS_KEY"}))),
    );

    let result = h.client.send_tx(increment()).await;
    assert!(matches!(result, Err(ClientError::AccessKey(_))));
    assert_eq!(h.transport.calls("send_tx"), 0);

    let history = h.client.history();
    assert_eq!(history.len(), 1);
    let record = history.values().next().unwrap();
    assert_eq!(record.status, TxStatus::Error);
    assert!(record.final_state);
}

#[tokio::test]
async fn test_submission_failure_marks_record() {
    let h = alice(None).await;
    h.transport.respond(
        "send_tx",
        Err(RpcError::Node(json!({"name": "INVALID_TRANSACTION"}))),
    );

    let result = h.client.send_tx(increment()).await;
    assert!(matches!(result, Err(ClientError::Rpc(_))));

    let record = h.client.history().into_values().next().unwrap();
    assert_eq!(record.status, TxStatus::Error);
    assert_eq!(record.error, Some(json!({"name": "INVALID_TRANSACTION"})));
    assert!(record.final_state);
}

#[tokio::test]
async fn test_execution_failure_after_inclusion() {
    let h = alice(None).await;
    h.transport.respond(
        "tx",
        Ok(json!({"status": {"Failure": {"ActionError": {"index": 0}}}})),
    );

    let mut dispatched = h.client.send_tx(increment()).await.unwrap();
    dispatched.settle().await;

    let record = h.client.tx(&dispatched.tx_id).unwrap();
    assert_eq!(record.status, TxStatus::ErrorAfterIncluded);
    assert!(record.final_state);
    assert!(record.error.is_some());
}

#[tokio::test]
async fn test_wallet_error_marks_record() {
    let h = alice(Some(json!({"error": "insufficient balance"}))).await;

    let dispatched = h
        .client
        .send_tx(SendTxRequest::new("app.near", vec![Action::transfer(5)]))
        .await
        .unwrap();

    let record = h.client.tx(&dispatched.tx_id).unwrap();
    assert_eq!(record.status, TxStatus::Error);
    assert_eq!(record.error, Some(json!("insufficient balance")));
}

#[tokio::test]
async fn test_silent_wallet_times_out() {
    let mut config = test_config();
    config.relay.timeout_secs = 1;
    let h = harness(config, alice_wallet(None)).await;
    h.client
        .request_sign_in(near_relay_client::client::SignInParams::for_contract("app.near"))
        .await
        .unwrap();

    let result = h
        .client
        .send_tx(SendTxRequest::new("app.near", vec![Action::transfer(1)]))
        .await;
    assert!(matches!(result, Err(ClientError::RelayTimeout(d)) if d == Duration::from_secs(1)));

    let record = h.client.history().into_values().next().unwrap();
    assert_eq!(record.status, TxStatus::Error);
    assert!(record.final_state);
    // The abandoned request no longer waits on the wallet
    assert_eq!(h.client.relay().pending_len(), 0);
}

#[tokio::test]
async fn test_missing_node_endpoint_is_config_error() {
    let mut config: ClientConfig = test_config();
    config.network.network_id = "localnet".to_string();

    let client = near_relay_client::NearClient::builder(config)
        .state_mode(near_relay_client::StateMode::Isolated)
        .surface(std::sync::Arc::new(alice_wallet(None)))
        .build()
        .await
        .unwrap();
    client
        .request_sign_in(near_relay_client::client::SignInParams::for_contract("app.near"))
        .await
        .unwrap();

    let result = client.send_tx(increment()).await;
    assert!(matches!(result, Err(ClientError::Config(_))));
    assert!(client.history().is_empty());

    let view = client
        .view("app.near", "get", &json!({}), Default::default())
        .await;
    assert!(matches!(view, Err(ClientError::Config(_))));
}
