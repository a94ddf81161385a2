//! In-memory content service and CDN used by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};

use depot_fetcher::app::cdn::{adler32, encode_chunk, CdnClient};
use depot_fetcher::app::manifest::encode_manifest;
use depot_fetcher::app::session::{
    AuthSession, AuthTokens, CodeVerdict, Connection, ContentService, GuardChannel, LogOnDetails,
    LogOnResult,
};
use depot_fetcher::app::{
    ChunkDescriptor, ChunkId, ContentEngine, DepotKey, DownloaderConfig, KeyValue, Manifest,
    ManifestFile, ServerEndpoint, SessionHub,
};
use depot_fetcher::auth::{Authenticator, Credentials, MemoryTokenStore, ScriptedAuthenticator};
use depot_fetcher::errors::{CdnError, CdnResult, SessionError, SessionResult};

pub const APP_ID: u32 = 10;
pub const DEPOT_ID: u32 = 1;
pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "hunter2";
pub const REQUEST_CODE: u64 = 4242;
pub const STORED_TOKEN: &str = "stored-token";
pub const ISSUED_TOKEN: &str = "issued-token";

pub fn depot_key() -> DepotKey {
    DepotKey([0x42; 32])
}

/// Shared state behind [`MockService`] and its connections
pub struct ServiceState {
    pub apps: Mutex<HashMap<u32, Value>>,
    pub servers: Mutex<Vec<ServerEndpoint>>,
    pub depot_keys: Mutex<HashMap<u32, DepotKey>>,
    pub guard: Mutex<GuardChannel>,
    pub accepted_codes: Mutex<HashSet<String>>,
    pub valid_tokens: Mutex<HashSet<String>>,
    pub connections: Mutex<Vec<Arc<MockConnection>>>,
    pub connects: AtomicUsize,
    pub logons: AtomicUsize,
    pub logoffs: AtomicUsize,
    pub auth_sessions: AtomicUsize,
    pub depot_key_requests: AtomicUsize,
    pub connect_delay: Mutex<Duration>,
    /// Answer every log on with this result instead of checking the token
    pub logon_result: Mutex<Option<LogOnResult>>,
    /// Drop the connection when a token log on is rejected
    pub disconnect_on_rejection: AtomicBool,
}

#[derive(Clone)]
pub struct MockService {
    pub state: Arc<ServiceState>,
}

impl MockService {
    pub fn new(server_count: usize) -> Self {
        let servers = (0..server_count)
            .map(|i| ServerEndpoint::new(format!("cdn{}.test", i)))
            .collect();
        let state = ServiceState {
            apps: Mutex::new(HashMap::new()),
            servers: Mutex::new(servers),
            depot_keys: Mutex::new(HashMap::from([(DEPOT_ID, depot_key())])),
            guard: Mutex::new(GuardChannel::None),
            accepted_codes: Mutex::new(HashSet::new()),
            valid_tokens: Mutex::new(HashSet::from([STORED_TOKEN.to_string()])),
            connections: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            logons: AtomicUsize::new(0),
            logoffs: AtomicUsize::new(0),
            auth_sessions: AtomicUsize::new(0),
            depot_key_requests: AtomicUsize::new(0),
            connect_delay: Mutex::new(Duration::ZERO),
            logon_result: Mutex::new(None),
            disconnect_on_rejection: AtomicBool::new(false),
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// Publish `branches` of the test depot, each as (branch, manifest id)
    pub fn publish(&self, branches: &[(&str, u64)]) {
        let manifests: serde_json::Map<String, Value> = branches
            .iter()
            .map(|(branch, gid)| (branch.to_string(), json!({ "gid": gid.to_string() })))
            .collect();
        let mut depots = serde_json::Map::new();
        depots.insert(DEPOT_ID.to_string(), json!({ "manifests": manifests }));
        let info = json!({
            "common": { "name": "Test App" },
            "depots": depots
        });
        self.state.apps.lock().insert(APP_ID, info);
    }

    /// Drop every open connection, as a network failure would
    pub fn disconnect_all(&self) {
        for connection in self.state.connections.lock().iter() {
            connection.connected.store(false, Ordering::SeqCst);
        }
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn auth_sessions(&self) -> usize {
        self.state.auth_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentService for MockService {
    async fn connect(&self) -> SessionResult<Arc<dyn Connection>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let connection = Arc::new(MockConnection {
            state: Arc::clone(&self.state),
            connected: AtomicBool::new(true),
        });
        self.state.connections.lock().push(Arc::clone(&connection));
        Ok(connection as Arc<dyn Connection>)
    }
}

pub struct MockConnection {
    state: Arc<ServiceState>,
    connected: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn begin_auth_session(
        &self,
        username: &str,
        password: &str,
        _persistent: bool,
    ) -> SessionResult<AuthSession> {
        self.state.auth_sessions.fetch_add(1, Ordering::SeqCst);
        if username != USERNAME || password != PASSWORD {
            return Err(SessionError::LogOnFailed {
                result: LogOnResult::InvalidPassword,
            });
        }
        Ok(AuthSession {
            id: "auth-1".to_string(),
            guard: self.state.guard.lock().clone(),
            poll_interval: Duration::from_millis(1),
        })
    }

    async fn submit_guard_code(
        &self,
        _session: &AuthSession,
        code: &str,
    ) -> SessionResult<CodeVerdict> {
        Ok(if self.state.accepted_codes.lock().contains(code) {
            CodeVerdict::Accepted
        } else {
            CodeVerdict::Rejected
        })
    }

    async fn poll_auth_session(&self, _session: &AuthSession) -> SessionResult<Option<AuthTokens>> {
        self.state
            .valid_tokens
            .lock()
            .insert(ISSUED_TOKEN.to_string());
        Ok(Some(AuthTokens {
            account_name: USERNAME.to_string(),
            refresh_token: ISSUED_TOKEN.to_string(),
        }))
    }

    async fn log_on(&self, details: &LogOnDetails) -> SessionResult<LogOnResult> {
        self.state.logons.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = *self.state.logon_result.lock() {
            return Ok(result);
        }
        if self.state.valid_tokens.lock().contains(&details.access_token) {
            return Ok(LogOnResult::Ok);
        }
        if self.state.disconnect_on_rejection.load(Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
        }
        Ok(LogOnResult::Expired)
    }

    async fn log_off(&self) -> SessionResult<()> {
        self.state.logoffs.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn product_info(&self, app_id: u32) -> SessionResult<Option<KeyValue>> {
        Ok(self
            .state
            .apps
            .lock()
            .get(&app_id)
            .map(|value| KeyValue::from_json(app_id.to_string(), value)))
    }

    async fn content_servers(&self, max: u32) -> SessionResult<Vec<ServerEndpoint>> {
        Ok(self
            .state
            .servers
            .lock()
            .iter()
            .take(max as usize)
            .cloned()
            .collect())
    }

    async fn manifest_request_code(
        &self,
        _depot_id: u32,
        _app_id: u32,
        _manifest_id: u64,
        _branch: &str,
    ) -> SessionResult<u64> {
        Ok(REQUEST_CODE)
    }

    async fn depot_key(&self, depot_id: u32, _app_id: u32) -> SessionResult<DepotKey> {
        self.state.depot_key_requests.fetch_add(1, Ordering::SeqCst);
        self.state
            .depot_keys
            .lock()
            .get(&depot_id)
            .cloned()
            .ok_or_else(|| SessionError::Protocol {
                reason: format!("no key for depot {}", depot_id),
            })
    }
}

/// CDN serving encoded manifests and chunks, with programmable failures
#[derive(Default)]
pub struct MockCdn {
    manifests: Mutex<HashMap<u64, Bytes>>,
    chunks: Mutex<HashMap<ChunkId, Bytes>>,
    chunk_failures: Mutex<HashMap<ChunkId, u32>>,
    failing_hosts: Mutex<HashSet<String>>,
    pub manifest_requests: Mutex<Vec<(String, u64)>>,
    pub chunk_requests: AtomicUsize,
    chunk_delay: Mutex<Duration>,
}

impl MockCdn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` requests for `chunk` with a 503
    pub fn fail_chunk(&self, chunk: ChunkId, times: u32) {
        self.chunk_failures.lock().insert(chunk, times);
    }

    /// Every manifest request to `host` fails
    pub fn fail_host(&self, host: &str) {
        self.failing_hosts.lock().insert(host.to_string());
    }

    /// Serve garbage instead of `chunk`
    pub fn corrupt_chunk(&self, chunk: ChunkId) {
        self.chunks
            .lock()
            .insert(chunk, Bytes::from_static(b"not an encrypted chunk"));
    }

    pub fn set_chunk_delay(&self, delay: Duration) {
        *self.chunk_delay.lock() = delay;
    }

    pub fn chunk_requests(&self) -> usize {
        self.chunk_requests.load(Ordering::SeqCst)
    }

    pub fn manifest_hosts(&self) -> Vec<String> {
        self.manifest_requests
            .lock()
            .iter()
            .map(|(host, _)| host.clone())
            .collect()
    }

    pub fn install(&self, fixture: &DepotFixture) {
        self.manifests
            .lock()
            .insert(fixture.manifest.manifest_id, fixture.payload.clone());
        let mut chunks = self.chunks.lock();
        for (id, data) in &fixture.chunks {
            chunks.insert(*id, data.clone());
        }
    }
}

#[async_trait]
impl CdnClient for MockCdn {
    async fn download_manifest(
        &self,
        server: &ServerEndpoint,
        _depot_id: u32,
        manifest_id: u64,
        request_code: u64,
    ) -> CdnResult<Bytes> {
        self.manifest_requests
            .lock()
            .push((server.host.clone(), request_code));

        if self.failing_hosts.lock().contains(&server.host) || request_code != REQUEST_CODE {
            return Err(CdnError::ServerError {
                host: server.host.clone(),
                status: 503,
            });
        }
        self.manifests
            .lock()
            .get(&manifest_id)
            .cloned()
            .ok_or_else(|| CdnError::ServerError {
                host: server.host.clone(),
                status: 404,
            })
    }

    async fn download_chunk(
        &self,
        server: &ServerEndpoint,
        _depot_id: u32,
        chunk_id: &ChunkId,
    ) -> CdnResult<Bytes> {
        self.chunk_requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.chunk_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.chunk_failures.lock();
            if let Some(remaining) = failures.get_mut(chunk_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(CdnError::ServerError {
                        host: server.host.clone(),
                        status: 503,
                    });
                }
            }
        }

        self.chunks
            .lock()
            .get(chunk_id)
            .cloned()
            .ok_or_else(|| CdnError::ServerError {
                host: server.host.clone(),
                status: 404,
            })
    }
}

/// One depot version: its manifest, encoded payloads and expected contents
pub struct DepotFixture {
    pub manifest: Manifest,
    pub payload: Bytes,
    pub chunks: Vec<(ChunkId, Bytes)>,
    pub contents: Vec<(PathBuf, Vec<u8>)>,
}

impl DepotFixture {
    /// Build a version whose files are split into `chunk_size` pieces
    pub fn build(manifest_id: u64, files: &[(&str, Vec<u8>)], chunk_size: usize) -> Self {
        let key = depot_key();
        let mut next_id: u64 = 0;
        let mut chunks = Vec::new();
        let mut manifest_files = Vec::new();
        let mut contents = Vec::new();

        for (name, data) in files {
            let mut descriptors = Vec::new();
            for (index, piece) in data.chunks(chunk_size.max(1)).enumerate() {
                next_id += 1;
                let mut id = [0u8; 20];
                id[..8].copy_from_slice(&manifest_id.to_be_bytes());
                id[8..16].copy_from_slice(&next_id.to_be_bytes());
                let id = ChunkId(id);

                let encoded = encode_chunk(piece, &key).expect("encode chunk");
                descriptors.push(ChunkDescriptor {
                    id,
                    offset: (index * chunk_size) as u64,
                    compressed_length: encoded.len() as u32,
                    uncompressed_length: piece.len() as u32,
                    checksum: adler32(piece),
                });
                chunks.push((id, Bytes::from(encoded)));
            }

            let path: PathBuf = name.split('/').collect();
            manifest_files.push(ManifestFile {
                path: path.clone(),
                total_size: data.len() as u64,
                flags: 0,
                chunks: descriptors,
            });
            contents.push((path, data.clone()));
        }

        let manifest = Manifest {
            depot_id: DEPOT_ID,
            manifest_id,
            files: manifest_files,
        };
        Self::from_parts(manifest, chunks, contents)
    }

    fn from_parts(
        manifest: Manifest,
        chunks: Vec<(ChunkId, Bytes)>,
        contents: Vec<(PathBuf, Vec<u8>)>,
    ) -> Self {
        let payload = encode_manifest(&manifest, Some(&depot_key())).expect("encode manifest");
        Self {
            manifest,
            payload: Bytes::from(payload),
            chunks,
            contents,
        }
    }

    /// Add a file entry with a size but no chunks (a directory or placeholder)
    pub fn with_metadata_entry(mut self, name: &str, total_size: u64) -> Self {
        self.manifest.files.push(ManifestFile {
            path: name.split('/').collect(),
            total_size,
            flags: 0,
            chunks: Vec::new(),
        });
        Self::from_parts(self.manifest, self.chunks, self.contents)
    }

    /// Reverse every file's chunk order in the manifest
    pub fn with_reversed_chunks(mut self) -> Self {
        for file in &mut self.manifest.files {
            file.chunks.reverse();
        }
        Self::from_parts(self.manifest, self.chunks, self.contents)
    }

    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|(id, _)| *id).collect()
    }
}

/// Deterministic pseudo-random content
pub fn sample_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i as u32).wrapping_mul(31).wrapping_add(seed as u32) % 251) as u8)
        .collect()
}

/// Service, CDN, hub and engine wired together
pub struct Harness {
    pub service: MockService,
    pub cdn: Arc<MockCdn>,
    pub token_store: Arc<MemoryTokenStore>,
    pub hub: Arc<SessionHub>,
    pub engine: Arc<ContentEngine>,
}

impl Harness {
    pub fn new(server_count: usize) -> Self {
        Self::with_config(server_count, DownloaderConfig::default())
    }

    pub fn with_config(server_count: usize, config: DownloaderConfig) -> Self {
        let token_store = Arc::new(MemoryTokenStore::new().with_token(USERNAME, STORED_TOKEN));
        Self::build(
            server_count,
            config,
            token_store,
            Arc::new(ScriptedAuthenticator::new(Vec::<String>::new(), true)),
        )
    }

    pub fn build(
        server_count: usize,
        config: DownloaderConfig,
        token_store: Arc<MemoryTokenStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let service = MockService::new(server_count);
        let cdn = Arc::new(MockCdn::new());
        let credentials =
            Credentials::new(USERNAME, Some(PASSWORD.to_string())).expect("valid credentials");

        let hub = Arc::new(
            SessionHub::new(
                Arc::new(service.clone()),
                credentials,
                token_store.clone(),
                authenticator,
            )
            .with_auth_timeout(Duration::from_secs(5)),
        );
        let engine = Arc::new(
            ContentEngine::new(Arc::clone(&hub), cdn.clone(), config).expect("valid config"),
        );

        Self {
            service,
            cdn,
            token_store,
            hub,
            engine,
        }
    }

    /// Publish a fixture on `branch` and serve it from the CDN
    pub fn publish(&self, branch: &str, fixture: &DepotFixture) {
        self.service
            .publish(&[(branch, fixture.manifest.manifest_id)]);
        self.cdn.install(fixture);
    }
}
