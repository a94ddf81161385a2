//! Persistence for login tokens
//!
//! A token issued by the interactive login is saved per account and reused
//! for later logons until the service rejects it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::constants::{auth, files};
use crate::errors::{SessionError, SessionResult};

/// Stores one login token per account
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token(&self, username: &str) -> SessionResult<Option<String>>;

    async fn save_token(&self, username: &str, token: &str) -> SessionResult<()>;

    /// Forget the token for an account; returns whether one existed
    async fn clear(&self, username: &str) -> SessionResult<bool>;
}

/// JSON file of `username -> token`, readable only by its owner
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// `<config dir>/depot-fetcher/tokens.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::APP_DIR_NAME).join(auth::TOKEN_STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_err(&self, source: std::io::Error) -> SessionError {
        SessionError::Storage {
            path: self.path.clone(),
            source,
        }
    }

    async fn load(&self) -> SessionResult<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.storage_err(e)),
        }
    }

    async fn store(&self, tokens: &BTreeMap<String, String>) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.storage_err(e))?;
        }

        let contents = serde_json::to_vec_pretty(tokens)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(auth::SECRET_FILE_PERMISSIONS);
        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| self.storage_err(e))?;

        // `mode` only applies when the file is created
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(auth::SECRET_FILE_PERMISSIONS);
            file.set_permissions(perms)
                .await
                .map_err(|e| self.storage_err(e))?;
        }

        file.write_all(&contents)
            .await
            .map_err(|e| self.storage_err(e))?;
        file.flush().await.map_err(|e| self.storage_err(e))?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get_token(&self, username: &str) -> SessionResult<Option<String>> {
        Ok(self.load().await?.remove(username))
    }

    async fn save_token(&self, username: &str, token: &str) -> SessionResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.load().await?;
        tokens.insert(username.to_string(), token.to_string());
        self.store(&tokens).await?;
        debug!("Saved login token for {} to {}", username, self.path.display());
        Ok(())
    }

    async fn clear(&self, username: &str) -> SessionResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.load().await?;
        if tokens.remove(username).is_none() {
            return Ok(false);
        }
        self.store(&tokens).await?;
        Ok(true)
    }
}

/// Tokens kept in memory only
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: parking_lot::Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a token
    pub fn with_token(self, username: &str, token: &str) -> Self {
        self.tokens
            .lock()
            .insert(username.to_string(), token.to_string());
        self
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get_token(&self, username: &str) -> SessionResult<Option<String>> {
        Ok(self.tokens.lock().get(username).cloned())
    }

    async fn save_token(&self, username: &str, token: &str) -> SessionResult<()> {
        self.tokens
            .lock()
            .insert(username.to_string(), token.to_string());
        Ok(())
    }

    async fn clear(&self, username: &str) -> SessionResult<bool> {
        Ok(self.tokens.lock().remove(username).is_some())
    }
}
