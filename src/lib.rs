//! Depot Fetcher Library
//!
//! Resolves application branches to depot manifest versions and reconstructs
//! their files byte-exactly from encrypted chunks fetched concurrently from a
//! pool of interchangeable CDN servers.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(DEFAULT_WORKER_COUNT, 12);
        assert_eq!(MAX_CHUNK_RETRIES, 8);
        assert_eq!(ENV_USERNAME, "DEPOT_USERNAME");
        assert!(USER_AGENT.contains("Depot-Fetcher"));
    }

    #[test]
    fn test_error_types() {
        let app_error = AppError::from(errors::SessionError::MissingCredentials);

        assert_eq!(app_error.category(), "session");
        assert!(!app_error.is_recoverable());
    }
}
