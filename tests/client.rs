//! Facade behaviour: sign-in, persistence modes, isolation, network switching.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use common::{
    alice, alice_wallet, harness, harness_with_mode, test_config, MockSurface, WALLET_ORIGIN,
};
use near_relay_client::client::{AuthStatus, SignInParams, SignMessageParams};
use near_relay_client::config::StorageMode;
use near_relay_client::relay::{RelayError, MESSAGE_TYPE};
use near_relay_client::state::{
    ExternalStateSource, LocalStateStore, SourceError, StateStore,
};
use near_relay_client::transaction::KeyPair;
use near_relay_client::{
    Action, ClientError, NearClient, SendTxRequest, SessionState, StateMode, TxStatus,
};

async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_sign_in_commits_scoped_key() {
    let h = harness(test_config(), alice_wallet(None)).await;
    assert_eq!(h.client.auth_status().await, AuthStatus::SignedOut);

    let outcome = h
        .client
        .request_sign_in(SignInParams::for_contract("app.near"))
        .await
        .unwrap();

    assert_eq!(outcome.account_id, "alice.near");
    assert!(!outcome.is_reconnection);
    assert_eq!(h.client.auth_status().await, AuthStatus::SignedIn);

    let state = h.client.state().await.unwrap();
    assert_eq!(state.access_key_contract_id.as_deref(), Some("app.near"));
    let key = KeyPair::from_secret(state.private_key.as_deref().unwrap()).unwrap();
    assert_eq!(state.public_key, Some(key.public_key().to_string()));
    assert_eq!(outcome.public_key, state.public_key);

    let posted = h.surface.posted();
    let envelope = &posted[0];
    assert_eq!(envelope.method, "signIn");
    assert_eq!(envelope.params["networkId"], "mainnet");
    assert_eq!(envelope.params["contractId"], "app.near");
    // The wallet is asked to add the key the client committed
    assert_eq!(
        envelope.params["publicKey"].as_str(),
        state.public_key.as_deref()
    );
    assert!(h.surface.opened()[0].ends_with("/public/login.html"));
    // The wallet never sees the secret
    assert!(h.client.relay().state().get("privateKey").is_none());
    assert_eq!(h.client.relay().state()["accountId"], "alice.near");
}

#[tokio::test]
async fn test_sign_in_wallet_error() {
    let surface = MockSurface::replying(|_| Some(json!({"error": "user closed"})));
    let h = harness(test_config(), surface).await;

    let result = h.client.request_sign_in(SignInParams::default()).await;
    assert!(matches!(result, Err(ClientError::Wallet(ref m)) if m == "user closed"));
    assert!(h.client.account_id().await.is_none());
}

#[tokio::test]
async fn test_sign_in_without_account_clears_state() {
    let h = alice(None).await;
    h.surface.set_responder(|_| Some(json!({})));

    let result = h.client.request_sign_in(SignInParams::default()).await;
    assert!(matches!(result, Err(ClientError::Wallet(_))));
    assert_eq!(h.client.auth_status().await, AuthStatus::SignedOut);
}

#[tokio::test]
async fn test_sign_out_then_reconnect() {
    let h = alice(None).await;
    let accounts = Arc::new(Mutex::new(Vec::new()));
    let seen = accounts.clone();
    let _sub = h
        .client
        .on_account(move |account| seen.lock().unwrap().push(account.clone()));

    h.client.sign_out().await.unwrap();
    assert_eq!(h.client.auth_status().await, AuthStatus::SignedOut);
    assert!(h.client.state().await.unwrap().private_key.is_none());
    assert_eq!(h.client.relay().state(), json!({}));

    let outcome = h
        .client
        .request_sign_in(SignInParams::for_contract("app.near"))
        .await
        .unwrap();
    assert!(outcome.is_reconnection);
    assert_eq!(
        *accounts.lock().unwrap(),
        vec![None, Some("alice.near".to_string())]
    );
}

#[tokio::test]
async fn test_new_key_drops_cached_nonce() {
    let h = alice(None).await;
    h.client
        .send_tx(SendTxRequest::new("app.near", vec![Action::function_call("a", json!({}))]))
        .await
        .unwrap()
        .settle()
        .await;

    h.client.sign_out().await.unwrap();
    h.client
        .request_sign_in(SignInParams::for_contract("app.near"))
        .await
        .unwrap();
    h.client
        .send_tx(SendTxRequest::new("app.near", vec![Action::function_call("b", json!({}))]))
        .await
        .unwrap()
        .settle()
        .await;

    assert_eq!(h.transport.calls("query:view_access_key"), 2);
}

#[tokio::test]
async fn test_isolated_clients_share_nothing() {
    let a = alice(None).await;
    let b = harness(test_config(), alice_wallet(None)).await;

    a.client
        .send_tx(SendTxRequest::new("app.near", vec![Action::function_call("a", json!({}))]))
        .await
        .unwrap()
        .settle()
        .await;

    assert!(b.client.account_id().await.is_none());
    assert!(b.client.history().is_empty());
    assert_eq!(a.client.history().len(), 1);

    b.client
        .request_sign_in(SignInParams::for_contract("app.near"))
        .await
        .unwrap();
    assert_ne!(a.client.public_key().await, b.client.public_key().await);
}

#[tokio::test]
async fn test_durable_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.storage.mode = StorageMode::Durable;
    config.storage.dir = dir.path().to_string_lossy().into_owned();

    let durable = || StateMode::Durable {
        dir: dir.path().to_path_buf(),
    };

    let first = harness_with_mode(config.clone(), alice_wallet(None), durable()).await;
    first
        .client
        .request_sign_in(SignInParams::for_contract("app.near"))
        .await
        .unwrap();
    let mut dispatched = first
        .client
        .send_tx(SendTxRequest::new("app.near", vec![Action::function_call("a", json!({}))]))
        .await
        .unwrap();
    dispatched.settle().await;
    let public_key = first.client.public_key().await;
    drop(first);

    let second = harness_with_mode(config, MockSurface::new(), durable()).await;
    assert_eq!(second.client.account_id().await.as_deref(), Some("alice.near"));
    assert_eq!(second.client.public_key().await, public_key);
    assert_eq!(
        second.client.tx(&dispatched.tx_id).unwrap().status,
        TxStatus::Executed
    );

    // Nonce comes from the durable cache
    second
        .client
        .send_tx(SendTxRequest::new("app.near", vec![Action::function_call("b", json!({}))]))
        .await
        .unwrap()
        .settle()
        .await;
    assert_eq!(second.transport.calls("query:view_access_key"), 0);
}

#[tokio::test]
async fn test_durable_state_is_scoped_by_network() {
    let dir = tempfile::tempdir().unwrap();
    let key = KeyPair::generate();
    LocalStateStore::durable(dir.path(), "testnet")
        .unwrap()
        .set_state(SessionState {
            account_id: Some("alice.testnet".to_string()),
            private_key: Some(key.secret()),
            ..SessionState::empty("testnet")
        })
        .await
        .unwrap();

    let h = harness_with_mode(
        test_config(),
        MockSurface::new(),
        StateMode::Durable {
            dir: dir.path().to_path_buf(),
        },
    )
    .await;
    assert!(h.client.account_id().await.is_none());

    h.client.switch_network("testnet").await.unwrap();
    assert_eq!(h.client.network_id(), "testnet");
    assert_eq!(h.client.account_id().await.as_deref(), Some("alice.testnet"));
    assert_eq!(h.client.public_key().await, Some(key.public_key().to_string()));

    let selected = h.client.selected().await;
    assert_eq!(selected.network, "testnet");
    assert_eq!(selected.account.as_deref(), Some("alice.testnet"));
}

#[tokio::test]
async fn test_switch_network_cancels_wallet_request() {
    let h = alice(None).await;
    let accounts = Arc::new(Mutex::new(Vec::new()));
    let seen = accounts.clone();
    let _sub = h
        .client
        .on_account(move |account| seen.lock().unwrap().push(account.clone()));

    let client = h.client.clone();
    let pending = tokio::spawn(async move {
        client
            .send_tx(SendTxRequest::new("app.near", vec![Action::transfer(1)]))
            .await
    });
    h.surface.wait_for_posts(2).await;

    h.client.switch_network("testnet").await.unwrap();
    let result = pending.await.unwrap();
    assert!(matches!(
        result,
        Err(ClientError::Relay(RelayError::Cancelled))
    ));

    assert!(h.client.history().is_empty());
    assert!(h.client.account_id().await.is_none());
    assert_eq!(*accounts.lock().unwrap(), vec![None]);

    // Listeners follow the client onto the new network
    h.client
        .request_sign_in(SignInParams::for_contract("app.testnet"))
        .await
        .unwrap();
    assert_eq!(accounts.lock().unwrap().len(), 2);
    assert_eq!(h.client.state().await.unwrap().network_id, "testnet");
}

#[tokio::test]
async fn test_wallet_pushed_account_change() {
    let h = alice(None).await;
    let accounts = Arc::new(Mutex::new(Vec::new()));
    let seen = accounts.clone();
    let _sub = h
        .client
        .on_account(move |account| seen.lock().unwrap().push(account.clone()));

    h.surface.send_from(
        WALLET_ORIGIN,
        json!({"type": MESSAGE_TYPE, "payload": {"state": {"accountId": "bob.near"}}}),
    );

    let observed = accounts.clone();
    eventually(move || observed.lock().unwrap().len() == 1).await;
    assert_eq!(h.client.account_id().await.as_deref(), Some("bob.near"));
    // Keys from the previous account are not carried over
    assert!(h.client.state().await.unwrap().private_key.is_none());
}

#[tokio::test]
async fn test_sign_message_through_wallet() {
    let h = alice(None).await;
    h.surface.set_responder(|envelope| {
        (envelope.method == "signMessage").then(|| {
            json!({"accountId": "alice.near", "publicKey": "ed25519:abc", "signature": "sig"})
        })
    });

    let mut params = SignMessageParams::new("hello", "app.near");
    params.nonce = Some([9u8; 32]);
    let signed = h.client.sign_message(params).await.unwrap();
    assert_eq!(signed.signature, "sig");

    let envelope = h.surface.posted().last().cloned().unwrap();
    assert_eq!(envelope.params["message"], "hello");
    assert_eq!(envelope.params["nonce"], json!(vec![9u8; 32]));
    assert!(h.surface.opened().last().unwrap().ends_with("/public/sign.html"));
}

#[tokio::test]
async fn test_sign_message_requires_account() {
    let h = harness(test_config(), alice_wallet(None)).await;
    let result = h
        .client
        .sign_message(SignMessageParams::new("hello", "app.near"))
        .await;
    assert!(matches!(result, Err(ClientError::Unauthenticated)));
    assert!(h.surface.posted().is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = test_config();
    config.relay.widget_url = "not a url".to_string();
    let result = NearClient::builder(config)
        .state_mode(StateMode::Isolated)
        .surface(Arc::new(MockSurface::new()))
        .build()
        .await;
    assert!(matches!(result, Err(ClientError::Config(_))));
}

#[tokio::test]
async fn test_tx_listener_sees_every_update() {
    let h = alice(None).await;
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = statuses.clone();
    let _sub = h
        .client
        .on_tx(move |record| seen.lock().unwrap().push(record.status));

    h.client
        .send_tx(SendTxRequest::new("app.near", vec![Action::function_call("a", json!({}))]))
        .await
        .unwrap()
        .settle()
        .await;

    let statuses = statuses.lock().unwrap();
    assert_eq!(statuses.first(), Some(&TxStatus::Pending));
    assert_eq!(statuses.last(), Some(&TxStatus::Executed));
    assert!(statuses.contains(&TxStatus::Included));
}

/// Host-owned session, as an embedding application would keep it.
#[derive(Default)]
struct HostSource {
    state: Mutex<Option<SessionState>>,
}

#[async_trait]
impl ExternalStateSource for HostSource {
    async fn get_state(&self) -> Result<Option<SessionState>, SourceError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn set_state(&self, state: SessionState) -> Result<(), SourceError> {
        *self.state.lock().unwrap() = Some(state);
        Ok(())
    }

    async fn clear_state(&self) -> Result<(), SourceError> {
        *self.state.lock().unwrap() = None;
        Ok(())
    }
}

#[tokio::test]
async fn test_external_source_owns_session() {
    let source = Arc::new(HostSource::default());
    let h = harness_with_mode(
        test_config(),
        alice_wallet(None),
        StateMode::External(source.clone()),
    )
    .await;

    h.client
        .request_sign_in(SignInParams::for_contract("app.near"))
        .await
        .unwrap();
    let stored = source.state.lock().unwrap().clone().unwrap();
    assert_eq!(stored.account_id.as_deref(), Some("alice.near"));

    // Host-side changes are visible on the next read
    *source.state.lock().unwrap() = Some(SessionState {
        account_id: Some("carol.near".to_string()),
        ..SessionState::empty("mainnet")
    });
    assert_eq!(h.client.account_id().await.as_deref(), Some("carol.near"));

    h.client.sign_out().await.unwrap();
    assert!(source.state.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_store_listeners_fire_on_subscribe() {
    let store = LocalStateStore::volatile("mainnet");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = store.subscribe(Box::new(move |state: &SessionState| {
        sink.lock().unwrap().push(state.account_id.clone())
    }));

    store
        .set_state(SessionState {
            account_id: Some("dave.near".to_string()),
            ..SessionState::empty("mainnet")
        })
        .await
        .unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![None, Some("dave.near".to_string())]
    );
}
