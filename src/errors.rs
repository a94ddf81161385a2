//! Error types for Depot Fetcher
//!
//! Each engine component owns an error enum. Chunk-level failures are
//! transient and recovered by the downloader's retry loop; every other kind
//! terminates the current high-level operation and is reported upward.

use std::path::PathBuf;

use thiserror::Error;

use crate::app::session::LogOnResult;

/// Session establishment and content service errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Missing environment variables for credentials
    #[error(
        "Missing account credentials. Set DEPOT_USERNAME and DEPOT_PASSWORD environment variables"
    )]
    MissingCredentials,

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Invalid username format
    #[error("Invalid username format: {reason}")]
    InvalidUsername { reason: String },

    /// Transport-level failure talking to the content service
    #[error("Content service request failed")]
    Transport(#[from] reqwest::Error),

    /// Content service answered with an unexpected status
    #[error("Content service returned HTTP {status} for {endpoint}")]
    Http { status: u16, endpoint: String },

    /// Content service answered with something we could not interpret
    #[error("Content service protocol error: {reason}")]
    Protocol { reason: String },

    /// The connection was lost or never established
    #[error("Connection to the content service is not available")]
    Disconnected,

    /// Log on completed with a non-success result
    #[error("Unable to log on: {result}")]
    LogOnFailed { result: LogOnResult },

    /// Every second-factor code we submitted was rejected
    #[error("Second-factor code rejected {attempts} times")]
    GuardCodeRejected { attempts: u32 },

    /// The user declined the device confirmation request
    #[error("Device confirmation was declined")]
    GuardDeclined,

    /// The authenticator could not produce a code
    #[error("Authenticator failed: {reason}")]
    Authenticator { reason: String },

    /// Credential authentication never produced tokens
    #[error("Authentication did not complete within {seconds} seconds")]
    AuthTimedOut { seconds: u64 },

    /// Token or credential persistence failed
    #[error("Credential storage error at {path}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Token store contents could not be parsed
    #[error("Token store is corrupted")]
    TokenStoreFormat(#[from] serde_json::Error),

    /// Console interaction failed
    #[error("Console I/O failed")]
    Console(#[source] std::io::Error),
}

/// Version resolution errors
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// Metadata query failed
    #[error("Product info query failed for app {app_id}")]
    QueryFailed {
        app_id: u32,
        #[source]
        source: SessionError,
    },

    /// Metadata query returned nothing for the app
    #[error("No product info returned for app {app_id}")]
    NoData { app_id: u32 },

    /// Branch entry present but carries no manifest id
    #[error("Branch '{branch}' of depot {depot_id} has no manifest id")]
    MissingManifestId { depot_id: u32, branch: String },

    /// Metadata contained a manifest reference we could not parse
    #[error("Malformed manifest id '{value}' for depot {depot_id} branch '{branch}'")]
    MalformedManifestId {
        depot_id: u32,
        branch: String,
        value: String,
    },
}

/// CDN transport and payload decoding errors
#[derive(Error, Debug)]
pub enum CdnError {
    /// HTTP request error
    #[error("CDN request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("CDN server {host} returned HTTP {status}")]
    ServerError { host: String, status: u16 },

    /// Invalid URL built from a server endpoint
    #[error("Invalid CDN URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Symmetric decryption failed
    #[error("Decryption failed: {reason}")]
    Decrypt { reason: String },

    /// Payload envelope could not be decompressed
    #[error("Decompression failed: {reason}")]
    Decompress { reason: String },

    /// Payload uses a compression scheme we do not support
    #[error("Unsupported payload compression: {magic}")]
    UnsupportedCompression { magic: String },

    /// Decoded chunk length differs from the descriptor
    #[error("Chunk length mismatch. Expected: {expected} bytes, got: {actual} bytes")]
    LengthMismatch { expected: u32, actual: usize },

    /// Decoded chunk checksum differs from the descriptor
    #[error("Chunk checksum mismatch. Expected: {expected:08x}, got: {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Client could not be configured
    #[error("Invalid CDN client configuration: {0}")]
    Configuration(String),

    /// Manifest payload is structurally invalid
    #[error("Malformed manifest: {reason}")]
    MalformedManifest { reason: String },
}

/// Manifest acquisition errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Every server in the pool failed to deliver the manifest
    #[error("Manifest {manifest_id} for depot {depot_id} unavailable from all {attempts} servers")]
    Unavailable {
        depot_id: u32,
        manifest_id: u64,
        attempts: usize,
    },

    /// Manifest request authorization could not be obtained
    #[error("Failed to obtain manifest request code for manifest {manifest_id}")]
    RequestCode {
        manifest_id: u64,
        #[source]
        source: SessionError,
    },

    /// Depot decryption key could not be obtained
    #[error("Failed to obtain decryption key for depot {depot_id}")]
    DepotKey {
        depot_id: u32,
        #[source]
        source: SessionError,
    },
}

/// A single chunk fetch or write failure, retried by the downloader
#[derive(Error, Debug)]
pub enum ChunkError {
    /// Fetching or decoding the chunk failed
    #[error(transparent)]
    Cdn(#[from] CdnError),

    /// Writing the chunk into its file failed
    #[error("Chunk write failed")]
    Write(#[from] std::io::Error),

    /// The blocking write task was cancelled or panicked
    #[error("Chunk write task failed: {reason}")]
    WriteTask { reason: String },
}

/// Materialization errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Session failure while preparing the download
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Manifest could not be obtained
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The server directory returned no servers
    #[error("No content servers available for depot {depot_id}")]
    NoServers { depot_id: u32 },

    /// File preparation failed
    #[error("Failed to prepare {path}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A chunk kept failing past the retry ceiling
    #[error("Chunk {chunk_id} of {path} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        chunk_id: String,
        path: PathBuf,
        attempts: u32,
        #[source]
        source: ChunkError,
    },

    /// A worker task panicked or was cancelled
    #[error("Download worker terminated unexpectedly: {reason}")]
    WorkerPanic { reason: String },

    /// Invalid downloader configuration
    #[error("Invalid downloader configuration: {0}")]
    Configuration(String),
}

/// Seen-version ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Ledger file could not be read or written
    #[error("Version ledger I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ledger file could not be parsed
    #[error("Version ledger is corrupted")]
    Format(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read or written
    #[error("Configuration file I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Resolution error
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// CDN client setup error
    #[error(transparent)]
    Cdn(#[from] CdnError),

    /// Ledger error
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if a later attempt of the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Session(SessionError::Transport(_))
            | AppError::Session(SessionError::Disconnected)
            | AppError::Session(SessionError::Http { .. })
            | AppError::Resolution(ResolutionError::QueryFailed { .. })
            | AppError::Manifest(ManifestError::Unavailable { .. })
            | AppError::Download(DownloadError::Manifest(ManifestError::Unavailable { .. }))
            | AppError::Download(DownloadError::RetriesExhausted { .. })
            | AppError::Download(DownloadError::NoServers { .. }) => true,

            AppError::Session(SessionError::MissingCredentials)
            | AppError::Session(SessionError::LogOnFailed { .. })
            | AppError::Session(SessionError::GuardDeclined)
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Session(_) => "session",
            AppError::Resolution(_) => "resolution",
            AppError::Manifest(_) => "manifest",
            AppError::Download(_) => "download",
            AppError::Cdn(_) => "cdn",
            AppError::Ledger(_) => "ledger",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Session result type alias
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Resolution result type alias
pub type ResolutionResult<T> = std::result::Result<T, ResolutionError>;

/// CDN result type alias
pub type CdnResult<T> = std::result::Result<T, CdnError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Chunk result type alias
pub type ChunkResult<T> = std::result::Result<T, ChunkError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Ledger result type alias
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
