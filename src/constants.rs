//! Application constants for Depot Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for authentication
pub mod env {
    /// Environment variable name for the account username
    pub const USERNAME: &str = "DEPOT_USERNAME";

    /// Environment variable name for the account password
    pub const PASSWORD: &str = "DEPOT_PASSWORD";
}

/// Authentication and credential-related constants
pub mod auth {
    use super::Duration;

    /// Minimum allowed username length
    pub const MIN_USERNAME_LENGTH: usize = 3;

    /// Maximum allowed username length
    pub const MAX_USERNAME_LENGTH: usize = 64;

    /// File permissions for credential and token files (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const SECRET_FILE_PERMISSIONS: u32 = 0o600;

    /// Token store file name inside the user config directory
    pub const TOKEN_STORE_FILE: &str = "tokens.json";

    /// How many rejected second-factor codes we tolerate before giving up
    pub const MAX_GUARD_CODE_ATTEMPTS: u32 = 3;

    /// Default interval between credential session polls
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Upper bound on how long credential authentication may take
    pub const AUTH_SESSION_TIMEOUT: Duration = Duration::from_secs(300);
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Depot-Fetcher/0.1.0";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 25;

    /// Default URL scheme for CDN endpoints
    pub const CDN_SCHEME: &str = "https";
}

/// Rate limiting configuration
pub mod limits {
    /// Default rate limit for CDN requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 50;
}

/// Manifest and chunk format constants
pub mod format {
    /// Manifest protocol version segment in the manifest URL
    pub const MANIFEST_VERSION: u32 = 5;

    /// Length of a depot key in bytes
    pub const DEPOT_KEY_LEN: usize = 32;

    /// Length of a chunk id (SHA-1 digest) in bytes
    pub const CHUNK_ID_LEN: usize = 20;

    /// PKZip local file header signature
    pub const ZIP_LOCAL_HEADER_MAGIC: [u8; 4] = *b"PK\x03\x04";

    /// VZip (LZMA) envelope magic
    pub const VZIP_MAGIC: [u8; 3] = *b"VZa";
}

/// Downloader and concurrency configuration
pub mod workers {
    /// Default number of chunk download workers
    pub const DEFAULT_WORKER_COUNT: usize = 12;

    /// Maximum recommended concurrent workers
    pub const MAX_WORKER_COUNT: usize = 64;

    /// Default number of servers requested from the server directory
    pub const DEFAULT_SERVER_POOL_SIZE: u32 = 12;

    /// Attempts a chunk may accumulate before a further failure is fatal
    pub const MAX_CHUNK_RETRIES: u32 = 8;

    /// Channel buffer size for progress events
    pub const PROGRESS_BUFFER_SIZE: usize = 256;
}

/// Update watcher constants
pub mod watch {
    use super::Duration;

    /// Default interval between update checks
    pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

    /// Default branch to watch
    pub const DEFAULT_BRANCH: &str = "public";

    /// Version ledger file name
    pub const LEDGER_FILE: &str = "versions.json";
}

/// File locations
pub mod files {
    /// Application directory name under the platform config directory
    pub const APP_DIR_NAME: &str = "depot-fetcher";

    /// Configuration file name
    pub const CONFIG_FILE_NAME: &str = "depot-fetcher.toml";

    /// System-wide configuration file
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/depot-fetcher/config.toml";

    /// Default content service gateway
    pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8700/";

    /// Default output directory
    pub const DEFAULT_OUTPUT_DIR: &str = "./output";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";

    /// Log directive target for this crate
    pub const CRATE_TARGET: &str = "depot_fetcher";
}

// Re-export commonly used constants for convenience
pub use env::{PASSWORD as ENV_PASSWORD, USERNAME as ENV_USERNAME};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use workers::{DEFAULT_WORKER_COUNT, MAX_CHUNK_RETRIES};
