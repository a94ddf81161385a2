//! Interactive second-factor authentication
//!
//! An [`Authenticator`] is consulted only while a session is being
//! established and the service asks for a second factor.

use std::collections::VecDeque;
use std::io::{self, Write};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::{SessionError, SessionResult};

/// Where a second-factor code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeChannel {
    /// Authenticator app on a device
    Device,
    /// Email sent to the (masked) address
    Email { address: String },
}

/// Source of second-factor input
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtain a code for `channel`; `retry` means the previous code was rejected
    async fn get_interactive_code(&self, channel: &CodeChannel, retry: bool)
        -> SessionResult<String>;

    /// Wait for the user to approve a device push; `false` means declined
    async fn confirm_device_push(&self) -> SessionResult<bool>;
}

/// Prompts on the terminal; codes are read without echo
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAuthenticator;

impl ConsoleAuthenticator {
    fn code_prompt(channel: &CodeChannel, retry: bool) -> String {
        let prefix = if retry {
            "The previous code was incorrect. "
        } else {
            ""
        };
        match channel {
            CodeChannel::Device => {
                format!("{}Enter the code from your authenticator app: ", prefix)
            }
            CodeChannel::Email { address } => {
                format!("{}Enter the code sent to {}: ", prefix, address)
            }
        }
    }
}

#[async_trait]
impl Authenticator for ConsoleAuthenticator {
    async fn get_interactive_code(
        &self,
        channel: &CodeChannel,
        retry: bool,
    ) -> SessionResult<String> {
        let prompt = Self::code_prompt(channel, retry);
        let code = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
            .await
            .map_err(|e| SessionError::Authenticator {
                reason: e.to_string(),
            })?
            .map_err(SessionError::Console)?;

        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(SessionError::Authenticator {
                reason: "no code entered".to_string(),
            });
        }
        Ok(code)
    }

    async fn confirm_device_push(&self) -> SessionResult<bool> {
        let answer = tokio::task::spawn_blocking(|| -> io::Result<String> {
            print!("Approve the sign-in on your device, then press Enter (n to cancel): ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| SessionError::Authenticator {
            reason: e.to_string(),
        })?
        .map_err(SessionError::Console)?;

        Ok(!answer.trim().to_lowercase().starts_with('n'))
    }
}

/// Replays a fixed list of codes; for tests and unattended runs
#[derive(Debug, Default)]
pub struct ScriptedAuthenticator {
    codes: Mutex<VecDeque<String>>,
    confirm: bool,
    requests: Mutex<Vec<(CodeChannel, bool)>>,
}

impl ScriptedAuthenticator {
    pub fn new<I, S>(codes: I, confirm: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: Mutex::new(codes.into_iter().map(Into::into).collect()),
            confirm,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every code request seen so far, with its retry flag
    pub fn requests(&self) -> Vec<(CodeChannel, bool)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Authenticator for ScriptedAuthenticator {
    async fn get_interactive_code(
        &self,
        channel: &CodeChannel,
        retry: bool,
    ) -> SessionResult<String> {
        self.requests.lock().push((channel.clone(), retry));
        self.codes
            .lock()
            .pop_front()
            .ok_or_else(|| SessionError::Authenticator {
                reason: "no scripted codes left".to_string(),
            })
    }

    async fn confirm_device_push(&self) -> SessionResult<bool> {
        Ok(self.confirm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_prompts() {
        let prompt = ConsoleAuthenticator::code_prompt(&CodeChannel::Device, false);
        assert!(prompt.starts_with("Enter the code"));

        let prompt = ConsoleAuthenticator::code_prompt(
            &CodeChannel::Email {
                address: "a***@example.com".to_string(),
            },
            true,
        );
        assert!(prompt.starts_with("The previous code was incorrect"));
        assert!(prompt.contains("a***@example.com"));
    }

    #[tokio::test]
    async fn test_scripted_authenticator() {
        let auth = ScriptedAuthenticator::new(["11111", "22222"], false);

        assert_eq!(
            auth.get_interactive_code(&CodeChannel::Device, false)
                .await
                .unwrap(),
            "11111"
        );
        assert_eq!(
            auth.get_interactive_code(&CodeChannel::Device, true)
                .await
                .unwrap(),
            "22222"
        );
        assert!(auth
            .get_interactive_code(&CodeChannel::Device, true)
            .await
            .is_err());
        assert!(!auth.confirm_device_push().await.unwrap());

        let retries: Vec<bool> = auth.requests().into_iter().map(|(_, r)| r).collect();
        assert_eq!(retries, vec![false, true, true]);
    }
}
