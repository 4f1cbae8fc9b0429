//! Environment constants and path utilities for ncio.
//!
//! This module centralizes the hardcoded paths, environment variable names
//! and defaults used throughout the application.

use std::path::{Path, PathBuf};

/// Puppet SSL directory holding the client certificates
pub const SSL_DIR: &str = "/etc/puppetlabs/puppet/ssl";

/// Certificate name preferred when present on the host
pub const ORCHESTRATOR_CERTNAME: &str = "pe-internal-orchestrator";

/// Path prefix of the v1 classifier API
pub const API_BASE_PATH: &str = "/classifier-api/v1";

/// Default classifier service port
pub const DEFAULT_PORT: u16 = 4433;

/// Default retry budget for refused connections, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 120;

/// Default class matcher for the transform subcommand
pub const DEFAULT_MATCHER: &str = "^puppet_enterprise";

/// Default log destination
pub const DEFAULT_LOGTO: &str = "STDERR";

/// Application directory name inside the user's home directory
pub const NCIO_DIR_NAME: &str = ".ncio";

/// Configuration file name in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "ncio.toml";

/// Configuration file name inside configuration directories
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// System configuration file
pub const SYSTEM_CONFIG_FILE: &str = "/etc/ncio/config.toml";

/// Environment variables consulted for option defaults
pub mod vars {
    pub const URI: &str = "NCIO_URI";
    pub const CERT: &str = "NCIO_CERT";
    pub const KEY: &str = "NCIO_KEY";
    pub const CACERT: &str = "NCIO_CACERT";
    pub const LOGTO: &str = "NCIO_LOGTO";
    pub const FILE: &str = "NCIO_FILE";
    pub const RETRY_CONNECTIONS: &str = "NCIO_RETRY_CONNECTIONS";
    pub const CONNECT_TIMEOUT: &str = "NCIO_CONNECT_TIMEOUT";
    pub const CONFIG: &str = "NCIO_CONFIG";
}

/// Local host name, lowercased. Falls back to `localhost`.
pub fn hostname() -> String {
    ::hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.to_lowercase())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Default service URI for a host
pub fn default_uri(host: &str) -> String {
    format!("https://{}:{}{}", host, DEFAULT_PORT, API_BASE_PATH)
}

pub fn cert_path(ssl_dir: &Path, certname: &str) -> PathBuf {
    ssl_dir.join("certs").join(format!("{}.pem", certname))
}

pub fn key_path(ssl_dir: &Path, certname: &str) -> PathBuf {
    ssl_dir.join("private_keys").join(format!("{}.pem", certname))
}

pub fn cacert_path(ssl_dir: &Path) -> PathBuf {
    ssl_dir.join("certs").join("ca.pem")
}

/// Certificate name to authenticate with.
///
/// The orchestrator certificate is whitelisted by default, so it is used when
/// both its certificate and key exist; otherwise the host's own certificate.
pub fn default_certname(ssl_dir: &Path, host: &str) -> String {
    let orchestrator_exists = cert_path(ssl_dir, ORCHESTRATOR_CERTNAME).is_file()
        && key_path(ssl_dir, ORCHESTRATOR_CERTNAME).is_file();

    if orchestrator_exists {
        ORCHESTRATOR_CERTNAME.to_string()
    } else {
        host.to_string()
    }
}

/// Build config file path in the user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    home_dir.join(NCIO_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build local config file path in the current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}
