//! HTTP/JSON gateway to the content service
//!
//! `POST {base}/session` opens a session; every other call lives under
//! `{base}/session/{id}/`. A transport failure or a 401/410 answer marks the
//! connection dead so the hub replaces it on next use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::app::cdn::ClientConfig;
use crate::app::keyvalue::KeyValue;
use crate::app::models::{DepotKey, ServerEndpoint};
use crate::app::session::service::{
    AuthSession, AuthTokens, CodeVerdict, Connection, ContentService, GuardChannel, LogOnDetails,
    LogOnResult,
};
use crate::errors::{SessionError, SessionResult};

#[derive(Deserialize)]
struct OpenSessionResponse {
    session_id: String,
}

#[derive(Serialize)]
struct BeginAuthRequest<'a> {
    username: &'a str,
    password: &'a str,
    persistent: bool,
}

#[derive(Deserialize)]
struct BeginAuthResponse {
    auth_id: String,
    guard: GuardChannel,
    #[serde(default)]
    poll_interval_secs: u64,
}

#[derive(Serialize)]
struct GuardCodeRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct GuardCodeResponse {
    accepted: bool,
}

#[derive(Deserialize)]
struct PollResponse {
    complete: bool,
    account_name: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct LogOnRequest<'a> {
    username: &'a str,
    access_token: &'a str,
    remember: bool,
}

#[derive(Deserialize)]
struct LogOnResponse {
    result: i32,
}

#[derive(Deserialize)]
struct RequestCodeResponse {
    code: u64,
}

#[derive(Deserialize)]
struct DepotKeyResponse {
    key: String,
}

/// Content service reached over HTTP
#[derive(Debug, Clone)]
pub struct GatewayService {
    base_url: Url,
    client: Client,
}

impl GatewayService {
    pub fn new(base_url: &str, config: &ClientConfig) -> SessionResult<Self> {
        Ok(Self {
            base_url: normalize_base(base_url)?,
            client: config.build_http_client()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl ContentService for GatewayService {
    async fn connect(&self) -> SessionResult<Arc<dyn Connection>> {
        let url = join(&self.base_url, "session")?;
        let response = self.client.post(url).send().await?;
        let opened: OpenSessionResponse = decode(response, "session").await?;
        debug!("Opened gateway session {}", opened.session_id);

        let session_url = join(&self.base_url, &format!("session/{}/", opened.session_id))?;
        Ok(Arc::new(GatewayConnection {
            client: self.client.clone(),
            session_url,
            connected: AtomicBool::new(true),
        }))
    }
}

/// One gateway session
#[derive(Debug)]
pub struct GatewayConnection {
    client: Client,
    session_url: Url,
    connected: AtomicBool,
}

impl GatewayConnection {
    fn url(&self, path: &str) -> SessionResult<Url> {
        join(&self.session_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> SessionResult<T> {
        match self.send_optional(request, endpoint).await? {
            Some(value) => Ok(value),
            None => Err(SessionError::Http {
                status: StatusCode::NOT_FOUND.as_u16(),
                endpoint: endpoint.to_string(),
            }),
        }
    }

    /// Like `send`, but a 404 answer is `None`
    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> SessionResult<Option<T>> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(SessionError::Transport(e));
            }
        };

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::GONE => {
                self.connected.store(false, Ordering::SeqCst);
                Err(SessionError::Disconnected)
            }
            _ => decode(response, endpoint).await.map(Some),
        }
    }
}

#[async_trait]
impl Connection for GatewayConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn begin_auth_session(
        &self,
        username: &str,
        password: &str,
        persistent: bool,
    ) -> SessionResult<AuthSession> {
        let body = BeginAuthRequest {
            username,
            password,
            persistent,
        };
        let request = self.client.post(self.url("auth/begin")?).json(&body);
        let response: BeginAuthResponse = self.send(request, "auth/begin").await?;

        Ok(AuthSession {
            id: response.auth_id,
            guard: response.guard,
            poll_interval: Duration::from_secs(response.poll_interval_secs),
        })
    }

    async fn submit_guard_code(
        &self,
        session: &AuthSession,
        code: &str,
    ) -> SessionResult<CodeVerdict> {
        let endpoint = format!("auth/{}/code", session.id);
        let request = self
            .client
            .post(self.url(&endpoint)?)
            .json(&GuardCodeRequest { code });
        let response: GuardCodeResponse = self.send(request, &endpoint).await?;

        Ok(if response.accepted {
            CodeVerdict::Accepted
        } else {
            CodeVerdict::Rejected
        })
    }

    async fn poll_auth_session(&self, session: &AuthSession) -> SessionResult<Option<AuthTokens>> {
        let endpoint = format!("auth/{}/poll", session.id);
        let request = self.client.post(self.url(&endpoint)?);
        let response: PollResponse = self.send(request, &endpoint).await?;

        if !response.complete {
            return Ok(None);
        }
        match (response.account_name, response.refresh_token) {
            (Some(account_name), Some(refresh_token)) => Ok(Some(AuthTokens {
                account_name,
                refresh_token,
            })),
            _ => Err(SessionError::Protocol {
                reason: "completed authentication without tokens".to_string(),
            }),
        }
    }

    async fn log_on(&self, details: &LogOnDetails) -> SessionResult<LogOnResult> {
        let body = LogOnRequest {
            username: &details.username,
            access_token: &details.access_token,
            remember: details.remember,
        };
        let request = self.client.post(self.url("logon")?).json(&body);
        let response: LogOnResponse = self.send(request, "logon").await?;
        Ok(LogOnResult::from_code(response.result))
    }

    async fn log_off(&self) -> SessionResult<()> {
        let request = self.client.post(self.url("logoff")?);
        let result = self.send_optional::<Value>(request, "logoff").await;
        self.connected.store(false, Ordering::SeqCst);
        result.map(|_| ())
    }

    async fn product_info(&self, app_id: u32) -> SessionResult<Option<KeyValue>> {
        let endpoint = format!("apps/{}/info", app_id);
        let request = self.client.get(self.url(&endpoint)?);
        let document: Option<Value> = self.send_optional(request, &endpoint).await?;

        Ok(document
            .filter(|value| !value.is_null())
            .map(|value| KeyValue::from_json(app_id.to_string(), &value)))
    }

    async fn content_servers(&self, max: u32) -> SessionResult<Vec<ServerEndpoint>> {
        let mut url = self.url("servers")?;
        url.query_pairs_mut().append_pair("max", &max.to_string());
        self.send(self.client.get(url), "servers").await
    }

    async fn manifest_request_code(
        &self,
        depot_id: u32,
        app_id: u32,
        manifest_id: u64,
        branch: &str,
    ) -> SessionResult<u64> {
        let endpoint = format!("depots/{}/manifests/{}/request-code", depot_id, manifest_id);
        let mut url = self.url(&endpoint)?;
        url.query_pairs_mut()
            .append_pair("app", &app_id.to_string())
            .append_pair("branch", branch);

        let response: RequestCodeResponse = self.send(self.client.get(url), &endpoint).await?;
        Ok(response.code)
    }

    async fn depot_key(&self, depot_id: u32, app_id: u32) -> SessionResult<DepotKey> {
        let endpoint = format!("depots/{}/key", depot_id);
        let mut url = self.url(&endpoint)?;
        url.query_pairs_mut()
            .append_pair("app", &app_id.to_string());

        let response: DepotKeyResponse = self.send(self.client.get(url), &endpoint).await?;
        decode_depot_key(&response.key)
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> SessionResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(SessionError::Http {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        });
    }
    Ok(response.json::<T>().await?)
}

fn normalize_base(base_url: &str) -> SessionResult<Url> {
    let with_slash = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&with_slash).map_err(|e| SessionError::Protocol {
        reason: format!("invalid service URL '{}': {}", base_url, e),
    })
}

fn join(base: &Url, path: &str) -> SessionResult<Url> {
    base.join(path).map_err(|e| SessionError::Protocol {
        reason: format!("invalid endpoint '{}': {}", path, e),
    })
}

fn decode_depot_key(encoded: &str) -> SessionResult<DepotKey> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| SessionError::Protocol {
            reason: format!("depot key is not base64: {}", e),
        })?;
    DepotKey::from_slice(&bytes).ok_or_else(|| SessionError::Protocol {
        reason: format!("depot key has {} bytes, expected 32", bytes.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base() {
        let url = normalize_base("http://127.0.0.1:8700/api").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8700/api/");
        let session = join(&url, "session/abc/").unwrap();
        assert_eq!(
            join(&session, "apps/10/info").unwrap().as_str(),
            "http://127.0.0.1:8700/api/session/abc/apps/10/info"
        );
        assert!(normalize_base("not a url").is_err());
    }

    #[test]
    fn test_decode_depot_key() {
        let encoded = BASE64.encode([7u8; 32]);
        assert_eq!(decode_depot_key(&encoded).unwrap(), DepotKey([7; 32]));
        assert!(decode_depot_key(&BASE64.encode([7u8; 16])).is_err());
        assert!(decode_depot_key("!!!").is_err());
    }

    #[test]
    fn test_begin_auth_response_shape() {
        let response: BeginAuthResponse = serde_json::from_str(
            r#"{"auth_id":"a1","guard":{"type":"device_code"},"poll_interval_secs":2}"#,
        )
        .unwrap();
        assert_eq!(response.auth_id, "a1");
        assert_eq!(response.guard, GuardChannel::DeviceCode);
        assert_eq!(response.poll_interval_secs, 2);
    }

    #[tokio::test]
    async fn test_connect_unreachable_service() {
        let config = ClientConfig {
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let service = GatewayService::new("http://127.0.0.1:9", &config).unwrap();
        assert!(matches!(
            service.connect().await,
            Err(SessionError::Transport(_))
        ));
    }
}
