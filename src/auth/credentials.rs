//! Account credential handling
//!
//! The username and password come from the environment (optionally loaded
//! from a `.env` file). The password is only needed when no stored token is
//! usable and the interactive login has to run.

use std::env;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::constants::{auth, env as env_constants};
use crate::errors::{SessionError, SessionResult};

/// Account credentials for the content service
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Option<String>,
}

impl Credentials {
    /// Create credentials after validating the username
    pub fn new(username: impl Into<String>, password: Option<String>) -> SessionResult<Self> {
        let username = username.into();
        if !is_valid_username(&username) {
            return Err(SessionError::InvalidUsername {
                reason: format!(
                    "expected {}-{} alphanumeric characters, dots, hyphens or underscores",
                    auth::MIN_USERNAME_LENGTH,
                    auth::MAX_USERNAME_LENGTH
                ),
            });
        }
        Ok(Self {
            username,
            password: password.filter(|p| !p.is_empty()),
        })
    }

    /// Read credentials from `DEPOT_USERNAME` / `DEPOT_PASSWORD`
    ///
    /// The username is required; the password is optional.
    pub fn from_env() -> SessionResult<Self> {
        let username = match env::var(env_constants::USERNAME) {
            Ok(name) => name,
            Err(env::VarError::NotPresent) => return Err(SessionError::MissingCredentials),
            Err(e) => return Err(SessionError::EnvVar(e)),
        };
        Self::new(username, env::var(env_constants::PASSWORD).ok())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Authentication status information
#[derive(Debug, Clone)]
pub struct AuthStatus {
    /// Whether username environment variable is set
    pub username_set: bool,
    /// Whether password environment variable is set
    pub password_set: bool,
    /// Whether .env file exists in current directory
    pub dotenv_file_exists: bool,
    /// Whether a login token is stored for the account (None = not checked)
    pub token_stored: Option<bool>,
}

impl AuthStatus {
    /// Get descriptive status message for display
    pub fn status_message(&self) -> String {
        match (self.username_set, self.password_set, self.token_stored) {
            (false, _, _) => "Missing username - set DEPOT_USERNAME".to_string(),
            (true, _, Some(true)) => "Logged in with a stored token".to_string(),
            (true, true, _) => "Credentials configured, no stored token yet".to_string(),
            (true, false, _) => {
                "No stored token and no password - run 'auth login' to sign in".to_string()
            }
        }
    }
}

/// Check current authentication status from the environment
pub fn get_auth_status() -> AuthStatus {
    AuthStatus {
        username_set: env::var(env_constants::USERNAME).is_ok(),
        password_set: env::var(env_constants::PASSWORD).is_ok(),
        dotenv_file_exists: Path::new(".env").exists(),
        token_stored: None,
    }
}

/// Prompt user for credentials interactively
pub fn prompt_credentials() -> SessionResult<(String, String)> {
    print!("Username: ");
    io::stdout().flush().map_err(SessionError::Console)?;

    let mut username = String::new();
    io::stdin()
        .read_line(&mut username)
        .map_err(SessionError::Console)?;
    let username = username.trim().to_string();

    if !is_valid_username(&username) {
        return Err(SessionError::InvalidUsername {
            reason: "Username should be alphanumeric with optional dots, hyphens, or underscores"
                .to_string(),
        });
    }

    let password = rpassword::prompt_password("Password: ").map_err(SessionError::Console)?;
    if password.is_empty() {
        return Err(SessionError::InvalidUsername {
            reason: "Password cannot be empty".to_string(),
        });
    }

    Ok((username, password))
}

/// Validate username format
pub fn is_valid_username(username: &str) -> bool {
    if username.len() < auth::MIN_USERNAME_LENGTH || username.len() > auth::MAX_USERNAME_LENGTH {
        return false;
    }

    username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_')
}

/// Save credentials to a .env file with owner-only permissions
///
/// Existing lines are kept; our two variables are replaced or appended.
pub fn save_credentials(env_path: &Path, username: &str, password: &str) -> SessionResult<()> {
    let storage_err = |source: io::Error| SessionError::Storage {
        path: env_path.to_path_buf(),
        source,
    };

    let mut lines = Vec::new();
    let mut username_found = false;
    let mut password_found = false;

    if env_path.exists() {
        let file = File::open(env_path).map_err(storage_err)?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(storage_err)?;
            let trimmed = line.trim();

            if trimmed.starts_with(&format!("{}=", env_constants::USERNAME)) {
                lines.push(format!("{}={}", env_constants::USERNAME, username));
                username_found = true;
            } else if trimmed.starts_with(&format!("{}=", env_constants::PASSWORD)) {
                lines.push(format!("{}={}", env_constants::PASSWORD, password));
                password_found = true;
            } else {
                lines.push(line);
            }
        }
    }

    if !username_found {
        lines.push(format!("{}={}", env_constants::USERNAME, username));
    }
    if !password_found {
        lines.push(format!("{}={}", env_constants::PASSWORD, password));
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(auth::SECRET_FILE_PERMISSIONS);
    }
    let mut file = options.open(env_path).map_err(storage_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata().map_err(storage_err)?.permissions();
        perms.set_mode(auth::SECRET_FILE_PERMISSIONS);
        file.set_permissions(perms).map_err(storage_err)?;
    }

    for line in lines {
        writeln!(file, "{}", line).map_err(storage_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_valid_username() {
        assert!(is_valid_username("testuser"));
        assert!(is_valid_username("test.user"));
        assert!(is_valid_username("test-user"));
        assert!(is_valid_username("test_user"));
        assert!(is_valid_username("user.name123"));

        assert!(!is_valid_username(""));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("test user"));
        assert!(!is_valid_username("test@user"));
        assert!(!is_valid_username(&"a".repeat(65)));
    }

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("testuser", Some(String::new())).unwrap();
        assert_eq!(creds.username(), "testuser");
        assert!(creds.password().is_none());

        let creds = Credentials::new("testuser", Some("hunter2".to_string())).unwrap();
        assert_eq!(creds.password(), Some("hunter2"));
        assert!(!format!("{:?}", creds).contains("hunter2"));

        assert!(matches!(
            Credentials::new("x", None),
            Err(SessionError::InvalidUsername { .. })
        ));
    }

    #[test]
    fn test_auth_status_messages() {
        let mut status = AuthStatus {
            username_set: false,
            password_set: false,
            dotenv_file_exists: false,
            token_stored: None,
        };
        assert!(status.status_message().contains("Missing username"));

        status.username_set = true;
        assert!(status.status_message().contains("auth login"));

        status.password_set = true;
        assert!(status.status_message().contains("no stored token"));

        status.token_stored = Some(true);
        assert!(status.status_message().contains("stored token"));
    }

    #[test]
    fn test_save_credentials_preserves_other_lines() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let env_path = temp_dir.path().join(".env");
        std::fs::write(&env_path, "RUST_LOG=debug\nDEPOT_USERNAME=old\n")?;

        save_credentials(&env_path, "testuser", "testpass")?;

        let contents = std::fs::read_to_string(&env_path)?;
        assert!(contents.contains("RUST_LOG=debug"));
        assert!(contents.contains("DEPOT_USERNAME=testuser"));
        assert!(contents.contains("DEPOT_PASSWORD=testpass"));
        assert!(!contents.contains("DEPOT_USERNAME=old"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&env_path)?.permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        Ok(())
    }
}
