//! Configuration discovery and resolution
//!
//! Options are resolved in this order, first match wins:
//! 1. Command line flag
//! 2. `NCIO_*` environment variable
//! 3. Configuration file: `--config`, ./ncio.toml, ~/.ncio/config.toml, /etc/ncio/config.toml
//! 4. Built-in defaults

use crate::cli::args::Args;
use crate::env;
use crate::http::{ConnectionConfig, TransportError};
use crate::support::io::FileOption;
use crate::support::retry::{FaultKind, RetryPolicy};
use serde::Deserialize;
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid service uri '{uri}': {source}")]
    InvalidUri {
        uri: String,
        source: url::ParseError,
    },
}

/// Options that may be set in a TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub uri: Option<String>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub cacert: Option<PathBuf>,
    pub logto: Option<String>,
    pub retry_connections: Option<bool>,
    pub connect_timeout: Option<u64>,
}

impl FileConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the explicitly named file, or the first discovered one, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading configuration from: {:?}", path);
            return FileConfig::from_toml_file(path);
        }

        match Self::find_config_file() {
            Some(path) => {
                debug!("Loading configuration from: {:?}", path);
                FileConfig::from_toml_file(path)
            }
            None => Ok(FileConfig::default()),
        }
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates().into_iter().find(|candidate| {
            debug!("Checking for config file: {:?}", candidate);
            candidate.is_file()
        })
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }
}

/// Fully resolved, read-only settings for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub uri: Url,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub cacert: PathBuf,
    pub logto: FileOption,
    pub debug: bool,
    pub retry_connections: bool,
    pub connect_timeout: Duration,
}

impl Settings {
    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        Self::resolve_with(args, file, &env::hostname(), Path::new(env::SSL_DIR))
    }

    /// Resolve against an explicit host name and SSL directory.
    pub fn resolve_with(
        args: &Args,
        file: FileConfig,
        host: &str,
        ssl_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let uri = args
            .uri
            .clone()
            .or(file.uri)
            .unwrap_or_else(|| env::default_uri(host));
        let uri = Url::parse(&uri).map_err(|source| ConfigError::InvalidUri { uri, source })?;

        let certname = env::default_certname(ssl_dir, host);
        let cert = args
            .cert
            .clone()
            .or(file.cert)
            .unwrap_or_else(|| env::cert_path(ssl_dir, &certname));
        let key = args
            .key
            .clone()
            .or(file.key)
            .unwrap_or_else(|| env::key_path(ssl_dir, &certname));
        let cacert = args
            .cacert
            .clone()
            .or(file.cacert)
            .unwrap_or_else(|| env::cacert_path(ssl_dir));

        let logto = args
            .logto
            .clone()
            .or(file.logto)
            .unwrap_or_else(|| env::DEFAULT_LOGTO.to_string());

        let connect_timeout = args
            .connect_timeout
            .or(file.connect_timeout)
            .unwrap_or(env::DEFAULT_CONNECT_TIMEOUT_SECS);

        Ok(Self {
            uri,
            cert,
            key,
            cacert,
            logto: FileOption::parse(&logto),
            debug: args.debug,
            retry_connections: args
                .retry_connections
                .or(file.retry_connections)
                .unwrap_or(false),
            connect_timeout: Duration::from_secs(connect_timeout),
        })
    }

    pub fn connection_config(&self) -> Result<ConnectionConfig, TransportError> {
        ConnectionConfig::from_uri(&self.uri, &self.cert, &self.key, &self.cacert)
    }

    /// Policy retrying refused connections, when enabled.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry_connections
            .then(|| RetryPolicy::new(self.connect_timeout).retry_on(FaultKind::ConnectionRefused))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;
    use tempfile::TempDir;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    #[serial]
    fn test_builtin_defaults() {
        let ssl_dir = TempDir::new().unwrap();
        let settings = Settings::resolve_with(
            &args(&["ncio", "backup"]),
            FileConfig::default(),
            "master1.puppet.vm",
            ssl_dir.path(),
        )
        .unwrap();

        assert_eq!(
            settings.uri.as_str(),
            "https://master1.puppet.vm:4433/classifier-api/v1"
        );
        assert_eq!(settings.cert, ssl_dir.path().join("certs/master1.puppet.vm.pem"));
        assert_eq!(
            settings.key,
            ssl_dir.path().join("private_keys/master1.puppet.vm.pem")
        );
        assert_eq!(settings.cacert, ssl_dir.path().join("certs/ca.pem"));
        assert_eq!(settings.logto, FileOption::Stderr);
        assert!(!settings.retry_connections);
        assert!(settings.retry_policy().is_none());
        assert_eq!(settings.connect_timeout, Duration::from_secs(120));
    }

    #[test]
    #[serial]
    fn test_file_config_fills_unset_flags() {
        let ssl_dir = TempDir::new().unwrap();
        let file = FileConfig {
            uri: Some("https://console.acme.com:4433/classifier-api/v1".into()),
            cert: Some(PathBuf::from("/file/cert.pem")),
            retry_connections: Some(true),
            connect_timeout: Some(30),
            ..Default::default()
        };

        let settings = Settings::resolve_with(
            &args(&["ncio", "--cert", "/flag/cert.pem", "backup"]),
            file,
            "node1",
            ssl_dir.path(),
        )
        .unwrap();

        assert_eq!(settings.uri.host_str(), Some("console.acme.com"));
        assert_eq!(settings.cert, PathBuf::from("/flag/cert.pem"));

        let policy = settings.retry_policy().unwrap();
        assert_eq!(policy.timeout, Some(Duration::from_secs(30)));
        assert!(policy.is_retryable(FaultKind::ConnectionRefused));
        assert!(!policy.is_retryable(FaultKind::Authentication));
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file_config() {
        let ssl_dir = TempDir::new().unwrap();
        // SAFETY: serialized with every other test that reads NCIO_* variables
        unsafe { std::env::set_var(env::vars::CONNECT_TIMEOUT, "7") };
        let parsed = args(&["ncio", "backup"]);
        unsafe { std::env::remove_var(env::vars::CONNECT_TIMEOUT) };

        let file = FileConfig {
            connect_timeout: Some(30),
            ..Default::default()
        };
        let settings = Settings::resolve_with(&parsed, file, "node1", ssl_dir.path()).unwrap();
        assert_eq!(settings.connect_timeout, Duration::from_secs(7));
    }

    #[test]
    #[serial]
    fn test_invalid_uri() {
        let ssl_dir = TempDir::new().unwrap();
        let result = Settings::resolve_with(
            &args(&["ncio", "--uri", "not a uri", "backup"]),
            FileConfig::default(),
            "node1",
            ssl_dir.path(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidUri { .. })));
    }

    #[test]
    #[serial]
    fn test_connection_config_from_settings() {
        let ssl_dir = TempDir::new().unwrap();
        let settings = Settings::resolve_with(
            &args(&["ncio", "--uri", "http://127.0.0.1:8080/classifier-api/v1", "backup"]),
            FileConfig::default(),
            "node1",
            ssl_dir.path(),
        )
        .unwrap();

        let config = settings.connection_config().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(!config.use_ssl);
    }

    #[test]
    fn test_load_explicit_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ncio.toml");
        fs::write(
            &config_path,
            "uri = \"https://master1.acme.com:4433/classifier-api/v1\"\n\
             logto = \"/var/log/ncio.log\"\n\
             retry_connections = true\n",
        )
        .unwrap();

        let loaded = ConfigDiscovery::load(Some(&config_path)).unwrap();
        assert_eq!(
            loaded,
            FileConfig {
                uri: Some("https://master1.acme.com:4433/classifier-api/v1".into()),
                logto: Some("/var/log/ncio.log".into()),
                retry_connections: Some(true),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ncio.toml");
        fs::write(&config_path, "hostname = \"typo\"\n").unwrap();

        let err = FileConfig::from_toml_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = ConfigDiscovery::load(Some(Path::new("/nonexistent/ncio.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_config_candidates() {
        let candidates = ConfigDiscovery::get_config_candidates();
        assert!(!candidates.is_empty());
        assert_eq!(candidates.last().unwrap(), Path::new("/etc/ncio/config.toml"));
    }
}
