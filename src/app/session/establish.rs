//! Connect and log on
//!
//! A stored token is tried first. When there is none, or the service rejects
//! it, the credential login runs once through the authenticator and the new
//! refresh token is stored for next time.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::session::service::{
    AuthSession, AuthTokens, CodeVerdict, Connection, ContentService, GuardChannel, LogOnDetails,
};
use crate::auth::{Authenticator, CodeChannel, Credentials, TokenStore};
use crate::constants::auth;
use crate::errors::{SessionError, SessionResult};

/// Everything a session establishment needs
pub(crate) struct Establisher<'a> {
    pub service: &'a dyn ContentService,
    pub credentials: &'a Credentials,
    pub token_store: &'a dyn TokenStore,
    pub authenticator: &'a dyn Authenticator,
    pub auth_timeout: Duration,
}

impl Establisher<'_> {
    pub(crate) async fn establish(&self) -> SessionResult<Arc<dyn Connection>> {
        let mut connection = self.service.connect().await?;
        debug!("Transport to content service is ready");

        match self.log_on(&mut connection).await {
            Ok(()) => Ok(connection),
            Err(e) => {
                release(connection.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Log `connection` on, replacing it if the service dropped it
    async fn log_on(&self, connection: &mut Arc<dyn Connection>) -> SessionResult<()> {
        let username = self.credentials.username();

        if let Some(token) = self.token_store.get_token(username).await? {
            let result = connection.log_on(&self.details(&token)).await?;
            if result.is_success() {
                info!("Logged on as {} with stored token", username);
                return Ok(());
            }
            if !result.is_token_rejection() {
                return Err(SessionError::LogOnFailed { result });
            }

            warn!("Stored token for {} was rejected ({})", username, result);
            self.token_store.clear(username).await?;
            if !connection.is_connected() {
                release(connection.as_ref()).await;
                *connection = self.service.connect().await?;
            }
        }

        let tokens = self.authenticate(connection.as_ref()).await?;
        self.token_store
            .save_token(username, &tokens.refresh_token)
            .await?;

        let result = connection.log_on(&self.details(&tokens.refresh_token)).await?;
        if !result.is_success() {
            return Err(SessionError::LogOnFailed { result });
        }

        info!("Logged on as {}", tokens.account_name);
        Ok(())
    }

    fn details(&self, token: &str) -> LogOnDetails {
        LogOnDetails {
            username: self.credentials.username().to_string(),
            access_token: token.to_string(),
            remember: true,
        }
    }

    async fn authenticate(&self, connection: &dyn Connection) -> SessionResult<AuthTokens> {
        let password = self
            .credentials
            .password()
            .ok_or(SessionError::MissingCredentials)?;

        info!(
            "Starting credential login for {}",
            self.credentials.username()
        );
        let session = connection
            .begin_auth_session(self.credentials.username(), password, true)
            .await?;

        match &session.guard {
            GuardChannel::None => {}
            GuardChannel::DeviceConfirmation => {
                if !self.authenticator.confirm_device_push().await? {
                    return Err(SessionError::GuardDeclined);
                }
            }
            GuardChannel::DeviceCode => {
                self.submit_codes(connection, &session, CodeChannel::Device)
                    .await?
            }
            GuardChannel::EmailCode { address } => {
                let channel = CodeChannel::Email {
                    address: address.clone(),
                };
                self.submit_codes(connection, &session, channel).await?
            }
        }

        self.poll(connection, &session).await
    }

    async fn submit_codes(
        &self,
        connection: &dyn Connection,
        session: &AuthSession,
        channel: CodeChannel,
    ) -> SessionResult<()> {
        let mut attempts = 0;
        loop {
            let code = self
                .authenticator
                .get_interactive_code(&channel, attempts > 0)
                .await?;
            attempts += 1;

            match connection.submit_guard_code(session, &code).await? {
                CodeVerdict::Accepted => return Ok(()),
                CodeVerdict::Rejected if attempts >= auth::MAX_GUARD_CODE_ATTEMPTS => {
                    return Err(SessionError::GuardCodeRejected { attempts });
                }
                CodeVerdict::Rejected => warn!("Second-factor code rejected, asking again"),
            }
        }
    }

    async fn poll(
        &self,
        connection: &dyn Connection,
        session: &AuthSession,
    ) -> SessionResult<AuthTokens> {
        let interval = if session.poll_interval.is_zero() {
            auth::DEFAULT_POLL_INTERVAL
        } else {
            session.poll_interval
        };

        tokio::time::timeout(
            self.auth_timeout,
            poll_until_complete(connection, session, interval),
        )
        .await
        .map_err(|_| SessionError::AuthTimedOut {
            seconds: self.auth_timeout.as_secs(),
        })?
    }
}

async fn poll_until_complete(
    connection: &dyn Connection,
    session: &AuthSession,
    interval: Duration,
) -> SessionResult<AuthTokens> {
    loop {
        if let Some(tokens) = connection.poll_auth_session(session).await? {
            return Ok(tokens);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Best-effort log off of a connection that will not be used
async fn release(connection: &dyn Connection) {
    if let Err(e) = connection.log_off().await {
        debug!("Ignoring log off failure on abandoned connection: {}", e);
    }
}
