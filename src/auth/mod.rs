//! Account authentication
//!
//! Credentials from the environment, persisted login tokens, and the
//! interactive second-factor flow used while establishing a session.
//!
//! # Examples
//!
//! ```rust,no_run
//! use depot_fetcher::auth::{Credentials, FileTokenStore, TokenStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::from_env()?;
//! let store = FileTokenStore::new("tokens.json");
//! if store.get_token(credentials.username()).await?.is_none() {
//!     println!("No stored token; the next connection will prompt for a login");
//! }
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod credentials;
pub mod token_store;

// Re-export main public API
pub use authenticator::{Authenticator, CodeChannel, ConsoleAuthenticator, ScriptedAuthenticator};
pub use credentials::{
    get_auth_status, is_valid_username, prompt_credentials, save_credentials, AuthStatus,
    Credentials,
};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
