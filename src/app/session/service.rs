//! Contracts with the content service
//!
//! A [`ContentService`] opens transports; a [`Connection`] is one transport
//! that can authenticate and answer metadata, directory and key queries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::keyvalue::KeyValue;
use crate::app::models::{DepotKey, ServerEndpoint};
use crate::errors::SessionResult;

/// Second-factor channel selected by the service for a credential login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardChannel {
    /// No second factor required
    None,
    /// Code from an authenticator device
    DeviceCode,
    /// Code sent by email
    EmailCode { address: String },
    /// Push confirmation on a device
    DeviceConfirmation,
}

/// A credential authentication in progress
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub guard: GuardChannel,
    pub poll_interval: Duration,
}

/// Whether the service accepted a second-factor code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeVerdict {
    Accepted,
    Rejected,
}

/// Tokens issued when credential authentication completes
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub account_name: String,
    pub refresh_token: String,
}

/// Log on request
#[derive(Debug, Clone)]
pub struct LogOnDetails {
    pub username: String,
    pub access_token: String,
    pub remember: bool,
}

/// Outcome of a log on request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOnResult {
    Ok,
    InvalidPassword,
    AccessDenied,
    Expired,
    Revoked,
    RateLimited,
    ServiceUnavailable,
    Other(i32),
}

impl LogOnResult {
    pub fn is_success(self) -> bool {
        self == LogOnResult::Ok
    }

    /// Results that mean a stored token is no longer usable
    pub fn is_token_rejection(self) -> bool {
        matches!(
            self,
            LogOnResult::InvalidPassword
                | LogOnResult::AccessDenied
                | LogOnResult::Expired
                | LogOnResult::Revoked
        )
    }

    /// Map a numeric service result code
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => LogOnResult::Ok,
            5 => LogOnResult::InvalidPassword,
            15 => LogOnResult::AccessDenied,
            20 => LogOnResult::ServiceUnavailable,
            26 => LogOnResult::Revoked,
            27 => LogOnResult::Expired,
            84 => LogOnResult::RateLimited,
            other => LogOnResult::Other(other),
        }
    }
}

impl fmt::Display for LogOnResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogOnResult::Ok => f.write_str("OK"),
            LogOnResult::InvalidPassword => f.write_str("invalid password or token"),
            LogOnResult::AccessDenied => f.write_str("access denied"),
            LogOnResult::Expired => f.write_str("token expired"),
            LogOnResult::Revoked => f.write_str("token revoked"),
            LogOnResult::RateLimited => f.write_str("rate limited"),
            LogOnResult::ServiceUnavailable => f.write_str("service unavailable"),
            LogOnResult::Other(code) => write!(f, "result code {}", code),
        }
    }
}

/// Opens transports to the content service
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn connect(&self) -> SessionResult<Arc<dyn Connection>>;
}

/// One transport to the content service
#[async_trait]
pub trait Connection: Send + Sync {
    /// Liveness predicate: the transport still reports itself connected
    fn is_connected(&self) -> bool;

    /// Start credential authentication
    async fn begin_auth_session(
        &self,
        username: &str,
        password: &str,
        persistent: bool,
    ) -> SessionResult<AuthSession>;

    /// Submit a second-factor code for a pending authentication
    async fn submit_guard_code(&self, session: &AuthSession, code: &str)
        -> SessionResult<CodeVerdict>;

    /// Poll a pending authentication; `None` until it completes
    async fn poll_auth_session(&self, session: &AuthSession) -> SessionResult<Option<AuthTokens>>;

    async fn log_on(&self, details: &LogOnDetails) -> SessionResult<LogOnResult>;

    async fn log_off(&self) -> SessionResult<()>;

    /// Product metadata document for an app; `None` when the service has none
    async fn product_info(&self, app_id: u32) -> SessionResult<Option<KeyValue>>;

    /// Ask the server directory for up to `max` CDN servers
    async fn content_servers(&self, max: u32) -> SessionResult<Vec<ServerEndpoint>>;

    /// Short-lived authorization for downloading one manifest
    async fn manifest_request_code(
        &self,
        depot_id: u32,
        app_id: u32,
        manifest_id: u64,
        branch: &str,
    ) -> SessionResult<u64>;

    async fn depot_key(&self, depot_id: u32, app_id: u32) -> SessionResult<DepotKey>;
}
