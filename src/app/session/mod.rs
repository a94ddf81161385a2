//! Session hub: one authenticated connection shared by the whole engine
//!
//! The hub hands out [`SessionHandle`]s, never the raw connection. A handle
//! is valid as long as its connection is; the next call to
//! [`SessionHub::get_or_create_connection`] replaces a dead connection.
//!
//! Establishment is single-flight: the slot mutex is held across connect and
//! log on, so concurrent callers during a reconnect share one attempt.

pub mod establish;
pub mod gateway;
pub mod service;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::keyvalue::KeyValue;
use crate::app::models::{DepotKey, ServerEndpoint};
use crate::auth::{Authenticator, Credentials, TokenStore};
use crate::constants::auth;
use crate::errors::SessionResult;

use establish::Establisher;

pub use gateway::{GatewayConnection, GatewayService};
pub use service::{
    AuthSession, AuthTokens, CodeVerdict, Connection, ContentService, GuardChannel, LogOnDetails,
    LogOnResult,
};

type DepotKeyCache = Arc<parking_lot::Mutex<HashMap<u32, DepotKey>>>;

/// Owner of the content service connection and session-scoped secrets
pub struct SessionHub {
    service: Arc<dyn ContentService>,
    credentials: Credentials,
    token_store: Arc<dyn TokenStore>,
    authenticator: Arc<dyn Authenticator>,
    auth_timeout: Duration,
    connection: Mutex<Option<Arc<dyn Connection>>>,
    depot_keys: DepotKeyCache,
    established: AtomicU64,
}

impl SessionHub {
    pub fn new(
        service: Arc<dyn ContentService>,
        credentials: Credentials,
        token_store: Arc<dyn TokenStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            service,
            credentials,
            token_store,
            authenticator,
            auth_timeout: auth::AUTH_SESSION_TIMEOUT,
            connection: Mutex::new(None),
            depot_keys: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            established: AtomicU64::new(0),
        }
    }

    /// Limit how long the credential login may take
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.token_store
    }

    /// Number of connections established so far
    pub fn connections_established(&self) -> u64 {
        self.established.load(Ordering::Relaxed)
    }

    /// Return the live connection, establishing a new one if needed
    pub async fn get_or_create_connection(&self) -> SessionResult<SessionHandle> {
        let mut slot = self.connection.lock().await;

        if let Some(connection) = slot.as_ref() {
            if connection.is_connected() {
                return Ok(self.handle(Arc::clone(connection)));
            }
            debug!("Cached connection is no longer connected; replacing it");
        }

        if let Some(stale) = slot.take() {
            if let Err(e) = stale.log_off().await {
                debug!("Ignoring log off failure on stale connection: {}", e);
            }
        }

        let connection = Establisher {
            service: self.service.as_ref(),
            credentials: &self.credentials,
            token_store: self.token_store.as_ref(),
            authenticator: self.authenticator.as_ref(),
            auth_timeout: self.auth_timeout,
        }
        .establish()
        .await?;

        let count = self.established.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Session established (connection #{})", count);
        *slot = Some(Arc::clone(&connection));
        Ok(self.handle(connection))
    }

    /// Log off and release the connection; safe to call repeatedly
    pub async fn dispose(&self) {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.take() {
            match connection.log_off().await {
                Ok(()) => info!("Logged off"),
                Err(e) => warn!("Log off failed: {}", e),
            }
        }
        self.depot_keys.lock().clear();
    }

    fn handle(&self, connection: Arc<dyn Connection>) -> SessionHandle {
        SessionHandle {
            connection,
            depot_keys: Arc::clone(&self.depot_keys),
        }
    }
}

/// Narrow view of a live connection
#[derive(Clone)]
pub struct SessionHandle {
    connection: Arc<dyn Connection>,
    depot_keys: DepotKeyCache,
}

impl SessionHandle {
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub async fn product_info(&self, app_id: u32) -> SessionResult<Option<KeyValue>> {
        self.connection.product_info(app_id).await
    }

    pub async fn content_servers(&self, max: u32) -> SessionResult<Vec<ServerEndpoint>> {
        self.connection.content_servers(max).await
    }

    pub async fn manifest_request_code(
        &self,
        depot_id: u32,
        app_id: u32,
        manifest_id: u64,
        branch: &str,
    ) -> SessionResult<u64> {
        self.connection
            .manifest_request_code(depot_id, app_id, manifest_id, branch)
            .await
    }

    /// Depot key, fetched once per depot for the life of the hub
    pub async fn depot_key(&self, depot_id: u32, app_id: u32) -> SessionResult<DepotKey> {
        if let Some(key) = self.depot_keys.lock().get(&depot_id) {
            return Ok(key.clone());
        }

        let key = self.connection.depot_key(depot_id, app_id).await?;
        debug!("Cached decryption key for depot {}", depot_id);
        self.depot_keys.lock().insert(depot_id, key.clone());
        Ok(key)
    }
}
