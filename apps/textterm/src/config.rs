use std::env;
use std::path::PathBuf;

use directories::BaseDirs;
use url::Url;

pub const SERVER_ENV: &str = "TEXTTERM_SERVER";
const DEFAULT_SERVER: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid server address {server}: {source}")]
    InvalidServer {
        server: String,
        source: url::ParseError,
    },
    #[error("unable to determine home directory")]
    NoHome,
}

/// textterm application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server address, with or without a scheme
    pub server: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let server = env::var(SERVER_ENV).unwrap_or_else(|_| DEFAULT_SERVER.to_string());
        Self::with_server(server)
    }

    pub fn with_server(server: impl Into<String>) -> Self {
        let server = server.into();
        // Normalize localhost to IPv4 to avoid IPv6 (::1) preference
        let server = if server.contains("localhost") {
            server.replacen("localhost", "127.0.0.1", 1)
        } else {
            server
        };
        Self { server }
    }

    pub fn server_url(&self) -> Result<Url, ConfigError> {
        let raw = if self.server.starts_with("http://") || self.server.starts_with("https://") {
            self.server.clone()
        } else {
            format!("http://{}", self.server)
        };
        Url::parse(&raw).map_err(|source| ConfigError::InvalidServer {
            server: self.server.clone(),
            source,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
        }
    }
}

/// Directory holding the history store and the default log file.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base = BaseDirs::new().ok_or(ConfigError::NoHome)?;
    Ok(base.home_dir().join(".textterm"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    // Mutex to ensure environment variable tests don't run in parallel
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.server, "127.0.0.1:8080");
        assert_eq!(config.server_url().unwrap().as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn from_env_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var(SERVER_ENV);
        }
        assert_eq!(Config::from_env(), Config::default());
    }

    #[test]
    fn from_env_custom_normalizes_localhost() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let original = env::var(SERVER_ENV).ok();
        unsafe {
            env::set_var(SERVER_ENV, "https://localhost:9443/app/");
        }
        let config = Config::from_env();
        assert_eq!(config.server, "https://127.0.0.1:9443/app/");
        assert_eq!(config.server_url().unwrap().port(), Some(9443));
        unsafe {
            match original {
                Some(orig) => env::set_var(SERVER_ENV, orig),
                None => env::remove_var(SERVER_ENV),
            }
        }
    }

    #[test]
    fn rejects_unparseable_server() {
        let err = Config::with_server("exa mple:80").server_url().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServer { .. }));
    }
}
