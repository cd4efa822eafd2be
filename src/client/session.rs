//! Everything scoped to one network: store, ledger, node client, dispatcher.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::SharedClock;
use crate::config::{DispatchConfig, NetworkConfig};
use crate::dispatch::TxDispatcher;
use crate::error::ClientResult;
use crate::events::{Subscribers, Subscription};
use crate::history::{TxLedger, TxRecord};
use crate::relay::WalletRelay;
use crate::rpc::{NodeClient, RpcTransport};
use crate::state::{ExternalStateSource, ExternalStateStore, LocalStateStore, SessionState, StateStore};
use crate::storage::{FileStorage, MemoryStorage, StorageBackend};

/// Where session state lives.
#[derive(Clone)]
pub enum StateMode {
    /// Files under `<dir>/<network_id>/`, shared by every client using `dir`.
    Durable { dir: PathBuf },
    /// Process memory private to one client.
    Isolated,
    /// Host-owned persistence; the client only reads and requests changes.
    External(Arc<dyn ExternalStateSource>),
}

impl std::fmt::Debug for StateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateMode::Durable { dir } => f.debug_struct("Durable").field("dir", dir).finish(),
            StateMode::Isolated => f.write_str("Isolated"),
            StateMode::External(_) => f.write_str("External"),
        }
    }
}

/// Builds a node transport for a network.
pub type TransportFactory = Arc<dyn Fn(&NetworkConfig) -> Arc<dyn RpcTransport> + Send + Sync>;

pub(crate) struct SessionDeps<'a> {
    pub mode: &'a StateMode,
    pub dispatch: &'a DispatchConfig,
    pub relay: Arc<WalletRelay>,
    pub relay_timeout: Duration,
    pub clock: SharedClock,
    pub transports: &'a TransportFactory,
}

pub(crate) struct NetworkSession {
    pub network: NetworkConfig,
    pub store: Arc<dyn StateStore>,
    pub ledger: Arc<TxLedger>,
    pub rpc: NodeClient,
    pub dispatcher: TxDispatcher,
    /// Facade bookkeeping such as the last signed-in account.
    pub meta: Arc<dyn StorageBackend>,
    forwarders: Mutex<Vec<Subscription>>,
}

impl NetworkSession {
    pub async fn open(network: NetworkConfig, deps: SessionDeps<'_>) -> ClientResult<Self> {
        let network_id = network.network_id.clone();
        let (store, storage): (Arc<dyn StateStore>, Arc<dyn StorageBackend>) = match deps.mode {
            StateMode::Durable { dir } => {
                let storage: Arc<dyn StorageBackend> = Arc::new(FileStorage::new(dir, &network_id)?);
                let store = LocalStateStore::with_storage(&network_id, storage.clone());
                (Arc::new(store), storage)
            }
            StateMode::Isolated => {
                let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
                let store = LocalStateStore::with_storage(&network_id, storage.clone());
                (Arc::new(store), storage)
            }
            StateMode::External(source) => {
                let store = ExternalStateStore::connect(source.clone(), &network_id).await;
                (Arc::new(store), Arc::new(MemoryStorage::new()))
            }
        };

        let ledger = Arc::new(TxLedger::new(storage.clone(), deps.clock.clone()));
        let rpc = NodeClient::new((deps.transports)(&network));
        let dispatcher = TxDispatcher::new(
            store.clone(),
            ledger.clone(),
            rpc.clone(),
            deps.relay,
            deps.clock,
            deps.dispatch.clone(),
            deps.relay_timeout,
        );

        tracing::debug!(network_id = %network_id, mode = ?deps.mode, "Network session opened");
        Ok(Self {
            network,
            store,
            ledger,
            rpc,
            dispatcher,
            meta: storage,
            forwarders: Mutex::new(Vec::new()),
        })
    }

    /// Forward this session's events to the facade's long-lived listeners.
    pub async fn attach(
        &self,
        accounts: Arc<Subscribers<Option<String>>>,
        txs: Arc<Subscribers<TxRecord>>,
    ) {
        let initial = self.store.get_state().await.and_then(|s| s.account_id);
        let last = Arc::new(Mutex::new(initial));

        let account_sub = self.store.subscribe(Box::new(move |state: &SessionState| {
            let changed = {
                let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
                if *last == state.account_id {
                    None
                } else {
                    *last = state.account_id.clone();
                    Some(state.account_id.clone())
                }
            };
            if let Some(account) = changed {
                accounts.notify(&account);
            }
        }));
        let tx_sub = self.ledger.subscribe(move |record| txs.notify(record));

        let mut forwarders = self.forwarders.lock().unwrap_or_else(|e| e.into_inner());
        forwarders.push(account_sub);
        forwarders.push(tx_sub);
    }

    /// Stop forwarding events.
    pub fn detach(&self) {
        let forwarders: Vec<Subscription> = self
            .forwarders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for subscription in forwarders {
            subscription.unsubscribe();
        }
    }

    pub async fn account_id(&self) -> Option<String> {
        self.store.get_state().await.and_then(|s| s.account_id)
    }
}
