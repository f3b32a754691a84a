//! Test helpers: an in-process key server and clients wired to it.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use whisper_core::protocol::dispatcher::{RequestDispatcher, RequestSender, Transport};
use whisper_core::protocol::messages::{
    ClientRequest, ErrorData, OneTimeKeyCountData, OneTimeKeyData, PeerBundleData, ResultPayload,
    ServerFrame, ServerResponse,
};
use whisper_core::protocol::request::{RequestError, RequestResult};
use whisper_core::protocol::wire;
use whisper_core::{Config, KeyData, KeyStore, MemoryStorage};

pub type Client = KeyData<Arc<MemoryStorage>>;

struct Account {
    identity_public: String,
    signed_prekey_id: u32,
    signed_prekey_public: String,
    signature: String,
    suite_id: u16,
    one_time_keys: VecDeque<OneTimeKeyData>,
}

#[derive(Default)]
struct ServerState {
    accounts: HashMap<String, Account>,
    /// (user, one-time key id) pairs that were handed out
    served: HashSet<(String, u32)>,
    log: Vec<(String, &'static str)>,
}

/// Key server: stores published bundles and hands out one-time keys once
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<ServerState>,
    offline: AtomicBool,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Process one request on behalf of `user`
    pub fn handle(&self, user: &str, request: ClientRequest) -> ServerResponse {
        let mut state = self.state.lock();
        state.log.push((user.to_string(), request.kind()));

        match request {
            ClientRequest::UploadKeyBundle(upload) => {
                state.accounts.insert(
                    user.to_string(),
                    Account {
                        identity_public: upload.identity_public,
                        signed_prekey_id: upload.signed_prekey_id,
                        signed_prekey_public: upload.signed_prekey_public,
                        signature: upload.signature,
                        suite_id: upload.suite_id,
                        one_time_keys: upload.one_time_keys.into(),
                    },
                );
                ServerResponse::Result(ResultPayload::Ack)
            }
            ClientRequest::AddOneTimeKeys(data) => match state.accounts.get_mut(user) {
                Some(account) => {
                    account.one_time_keys.extend(data.one_time_keys);
                    ServerResponse::Result(ResultPayload::Ack)
                }
                None => not_found(),
            },
            ClientRequest::GetOneTimeKeyCount => match state.accounts.get(user) {
                Some(account) => ServerResponse::Result(ResultPayload::OneTimeKeyCount(OneTimeKeyCountData {
                    count: account.one_time_keys.len() as u32,
                })),
                None => not_found(),
            },
            ClientRequest::GetPeerBundle(data) => {
                let ServerState { accounts, served, .. } = &mut *state;
                let Some(account) = accounts.get_mut(&data.user_id) else {
                    return not_found();
                };
                let one_time_key = account.one_time_keys.pop_front();
                if let Some(key) = &one_time_key {
                    assert!(
                        served.insert((data.user_id.clone(), key.id)),
                        "one-time key {} served twice",
                        key.id
                    );
                }
                ServerResponse::Result(ResultPayload::PeerBundle(PeerBundleData {
                    user_id: data.user_id,
                    identity_public: account.identity_public.clone(),
                    signed_prekey_id: account.signed_prekey_id,
                    signed_prekey_public: account.signed_prekey_public.clone(),
                    signature: account.signature.clone(),
                    one_time_key,
                    suite_id: account.suite_id,
                }))
            }
        }
    }

    /// Ids of the one-time keys the server still holds for `user`
    pub fn one_time_key_ids(&self, user: &str) -> Vec<u32> {
        self.state
            .lock()
            .accounts
            .get(user)
            .map(|a| a.one_time_keys.iter().map(|k| k.id).collect())
            .unwrap_or_default()
    }

    /// Drop keys from the front of the pool, as if other peers consumed them
    pub fn consume_one_time_keys(&self, user: &str, leave: usize) {
        let mut state = self.state.lock();
        if let Some(account) = state.accounts.get_mut(user) {
            while account.one_time_keys.len() > leave {
                account.one_time_keys.pop_front();
            }
        }
    }

    pub fn signed_prekey_id(&self, user: &str) -> Option<u32> {
        self.state.lock().accounts.get(user).map(|a| a.signed_prekey_id)
    }

    /// How many requests of `kind` `user` has sent
    pub fn request_count(&self, user: &str, kind: &str) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|(u, k)| u == user && *k == kind)
            .count()
    }

    /// Direct connection: every request is answered synchronously
    pub fn connect(self: &Arc<Self>, user: &str) -> Arc<DirectConnection> {
        Arc::new(DirectConnection {
            server: Arc::clone(self),
            user: user.to_string(),
        })
    }

    /// KeyData for `user` talking to this server directly
    pub fn client(self: &Arc<Self>, user: &str, config: Config) -> Client {
        let store = KeyStore::new(Arc::new(MemoryStorage::new()), config);
        KeyData::new(store, self.connect(user))
    }

    /// KeyData for `user` whose peer bundle fetches wait on a gate
    pub fn gated_client(self: &Arc<Self>, user: &str, config: Config) -> (Client, Arc<GatedConnection>) {
        let gate = Arc::new(GatedConnection {
            inner: self.connect(user),
            gate: Semaphore::new(0),
            waiting: AtomicUsize::new(0),
        });
        let store = KeyStore::new(Arc::new(MemoryStorage::new()), config);
        (KeyData::new(store, gate.clone()), gate)
    }
}

fn not_found() -> ServerResponse {
    ServerResponse::Error(ErrorData {
        code: Some("item-not-found".to_string()),
        text: None,
    })
}

pub struct DirectConnection {
    server: Arc<FakeServer>,
    user: String,
}

#[async_trait]
impl RequestSender for DirectConnection {
    async fn request(&self, request: ClientRequest) -> RequestResult {
        if self.server.offline.load(Ordering::SeqCst) {
            return Err(RequestError::NotConnected);
        }
        match self.server.handle(&self.user, request) {
            ServerResponse::Result(payload) => Ok(payload),
            ServerResponse::Error(error) => Err(RequestError::Server {
                code: error.code,
                text: error.text,
            }),
        }
    }
}

/// Direct connection that holds `GetPeerBundle` until the gate is opened
pub struct GatedConnection {
    inner: Arc<DirectConnection>,
    gate: Semaphore,
    waiting: AtomicUsize,
}

impl GatedConnection {
    /// Let `fetches` held bundle requests through
    pub fn open(&self, fetches: usize) {
        self.gate.add_permits(fetches);
    }

    /// Wait until `fetches` bundle requests are parked at the gate
    pub async fn wait_for_fetches(&self, fetches: usize) {
        while self.waiting.load(Ordering::SeqCst) < fetches {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl RequestSender for GatedConnection {
    async fn request(&self, request: ClientRequest) -> RequestResult {
        if matches!(request, ClientRequest::GetPeerBundle(_)) {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.map_err(|_| RequestError::ChannelClosed)?;
            permit.forget();
        }
        self.inner.request(request).await
    }
}

/// Transport that hands frames to a server task over a channel
pub struct LoopbackTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    connected: AtomicBool,
    /// Frames to lose before delivering again
    drop_next: AtomicUsize,
    pub sent: AtomicUsize,
}

impl LoopbackTransport {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn drop_next(&self, frames: usize) {
        self.drop_next.store(frames, Ordering::SeqCst);
    }
}

impl Transport for LoopbackTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, frame: Vec<u8>) -> Result<(), RequestError> {
        if !self.is_connected() {
            return Err(RequestError::NotConnected);
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        let lost = self
            .drop_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Ok(());
        }
        self.tx.send(frame).map_err(|_| RequestError::NotConnected)
    }
}

/// Dispatcher for `user` whose frames are answered by a spawned server task
pub fn spawn_dispatcher(
    server: &Arc<FakeServer>,
    user: &str,
    config: Config,
) -> (Arc<RequestDispatcher>, Arc<LoopbackTransport>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let transport = Arc::new(LoopbackTransport {
        tx,
        connected: AtomicBool::new(true),
        drop_next: AtomicUsize::new(0),
        sent: AtomicUsize::new(0),
    });
    let dispatcher = Arc::new(RequestDispatcher::new(transport.clone(), config));

    let server = Arc::clone(server);
    let user = user.to_string();
    let inbound = Arc::clone(&dispatcher);
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let request = wire::unpack_request_frame(&frame).expect("client sent a valid frame");
            let response = server.handle(&user, request.request);
            let reply = wire::pack_server_frame(&ServerFrame::Response {
                id: request.id,
                response,
            })
            .expect("server frame packs");
            inbound.handle_frame(&reply).expect("client accepts the reply");
        }
    });

    (dispatcher, transport)
}

/// Config with small, deterministic numbers for tests
pub fn test_config() -> Config {
    Config {
        request_timeout_ms: 500,
        ..Config::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
