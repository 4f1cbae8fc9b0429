//! Command line argument parsing
//!
//! The model is `ncio [GLOBAL OPTIONS] SUBCOMMAND [SUBCOMMAND OPTIONS]`:
//! - `backup`: Backup Node Classification groups
//! - `restore`: Restore Node Classification groups
//! - `transform`: Rewrite hostnames in a backup for another cluster
//!
//! Global options fall back to `NCIO_*` environment variables, then to the
//! configuration file, then to built-in defaults.

use crate::env;
use crate::support::io::FileOption;
use crate::support::transform::{ClassMatcher, HostnameMap, Transformer};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Backup(BackupConfig),
    Restore(RestoreConfig),
    Transform(TransformConfig),
}

#[derive(Debug)]
pub struct BackupConfig {
    pub file: FileOption,
    pub inherited: bool,
}

#[derive(Debug)]
pub struct RestoreConfig {
    pub file: FileOption,
}

#[derive(Debug)]
pub struct TransformConfig {
    pub input: FileOption,
    pub output: FileOption,
    pub transformer: Transformer,
}

const AFTER_HELP: &str = "\
Quick Start: On the host of the Node Classifier service, as root or pe-puppet
(to read certs and keys)

    ncio backup > groups.$(date +%s).json
    ncio restore < groups.1467151827.json

Transform a backup taken on master1 for restoration on master2:

    ncio transform --hostname master1.acme.com:master2.acme.com \\
        --input groups.json --output groups.master2.json";

#[derive(Debug, Parser)]
#[command(name = "ncio")]
#[command(author = "Ncio Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Node Classification backup, restore, and transform")]
#[command(long_about = None)]
#[command(after_help = AFTER_HELP)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Node Classifier service uri [default: https://<hostname>:4433/classifier-api/v1]
    #[arg(long, env = env::vars::URI)]
    pub uri: Option<String>,
    /// White listed client SSL cert
    #[arg(long, env = env::vars::CERT, value_name = "PEM")]
    pub cert: Option<PathBuf>,
    /// Client RSA key, must match certificate
    #[arg(long, env = env::vars::KEY, value_name = "PEM")]
    pub key: Option<PathBuf>,
    /// CA Cert to authenticate the service uri
    #[arg(long, env = env::vars::CACERT, value_name = "PEM")]
    pub cacert: Option<PathBuf>,
    /// Log file to write to or keywords STDOUT, STDERR [default: STDERR]
    #[arg(long, env = env::vars::LOGTO)]
    pub logto: Option<String>,
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
    /// Retry refused connections until the connect timeout expires
    #[arg(
        long,
        env = env::vars::RETRY_CONNECTIONS,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub retry_connections: Option<bool>,
    /// Seconds to keep retrying refused connections [default: 120]
    #[arg(long, env = env::vars::CONNECT_TIMEOUT, value_name = "SECONDS")]
    pub connect_timeout: Option<u64>,
    /// Configuration file path (TOML)
    #[arg(short = 'c', long = "config", env = env::vars::CONFIG)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Backup Node Classification resources
    Backup {
        /// File to write to, or STDOUT, STDERR
        #[arg(short = 'f', long = "file", env = env::vars::FILE, default_value = "STDOUT")]
        file: String,
        /// Include classes, parameters and variables inherited from ancestors
        #[arg(long)]
        inherited: bool,
    },
    /// Restore Node Classification resources
    Restore {
        /// File to read from, or STDIN
        #[arg(short = 'f', long = "file", env = env::vars::FILE, default_value = "STDIN")]
        file: String,
    },
    /// Transform a backup for restoration on a different cluster
    Transform {
        /// Backup to read, or STDIN
        #[arg(short = 'i', long = "input", default_value = "STDIN")]
        input: String,
        /// File to write the transformed backup to, or STDOUT
        #[arg(short = 'o', long = "output", default_value = "STDOUT")]
        output: String,
        /// Hostname mapping, may be given multiple times
        #[arg(long = "hostname", value_name = "OLD:NEW", value_parser = parse_hostname_pair)]
        hostnames: Vec<(String, String)>,
        /// Regular expression selecting the classes to transform
        #[arg(long = "matcher", value_name = "REGEX", default_value = env::DEFAULT_MATCHER)]
        matcher: String,
    },
}

fn parse_hostname_pair(value: &str) -> Result<(String, String), String> {
    HostnameMap::parse_pair(value).map_err(|e| e.to_string())
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Backup { file, inherited }) => Ok(ExecutionMode::Backup(BackupConfig {
                file: FileOption::parse(file),
                inherited: *inherited,
            })),
            Some(Commands::Restore { file }) => Ok(ExecutionMode::Restore(RestoreConfig {
                file: FileOption::parse(file),
            })),
            Some(Commands::Transform {
                input,
                output,
                hostnames,
                matcher,
            }) => {
                let matcher = ClassMatcher::new(matcher).map_err(|e| e.to_string())?;
                let hostname_map: HostnameMap = hostnames.iter().cloned().collect();

                Ok(ExecutionMode::Transform(TransformConfig {
                    input: FileOption::parse(input),
                    output: FileOption::parse(output),
                    transformer: Transformer::new(hostname_map, matcher),
                }))
            }
            None => {
                Err("No command specified. Use 'ncio --help' to see available commands.".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    #[serial]
    fn test_backup_defaults_to_stdout() {
        let args = parse(&["ncio", "backup"]);
        match args.mode().unwrap() {
            ExecutionMode::Backup(config) => {
                assert_eq!(config.file, FileOption::Stdout);
                assert!(!config.inherited);
            }
            other => panic!("Expected Backup mode, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_backup_to_file() {
        let args = parse(&["ncio", "--debug", "backup", "--file", "/tmp/foo.json", "--inherited"]);
        assert!(args.debug);
        match args.mode().unwrap() {
            ExecutionMode::Backup(config) => {
                assert_eq!(config.file, FileOption::Path(PathBuf::from("/tmp/foo.json")));
                assert!(config.inherited);
            }
            other => panic!("Expected Backup mode, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_restore_defaults_to_stdin() {
        let args = parse(&["ncio", "restore"]);
        match args.mode().unwrap() {
            ExecutionMode::Restore(config) => assert_eq!(config.file, FileOption::Stdin),
            other => panic!("Expected Restore mode, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_global_options() {
        let args = parse(&[
            "ncio",
            "--uri",
            "https://foo.acme.mock:14433/classifier-api/v1",
            "--cert",
            "/tmp/cert.pem",
            "--key",
            "/tmp/key.pem",
            "--cacert",
            "/tmp/ca.pem",
            "--logto",
            "STDOUT",
            "--retry-connections",
            "--connect-timeout",
            "5",
            "backup",
        ]);

        assert_eq!(args.uri.as_deref(), Some("https://foo.acme.mock:14433/classifier-api/v1"));
        assert_eq!(args.cert, Some(PathBuf::from("/tmp/cert.pem")));
        assert_eq!(args.key, Some(PathBuf::from("/tmp/key.pem")));
        assert_eq!(args.cacert, Some(PathBuf::from("/tmp/ca.pem")));
        assert_eq!(args.logto.as_deref(), Some("STDOUT"));
        assert_eq!(args.retry_connections, Some(true));
        assert_eq!(args.connect_timeout, Some(5));
    }

    #[test]
    #[serial]
    fn test_retry_connections_can_be_disabled_explicitly() {
        let args = parse(&["ncio", "--retry-connections=false", "backup"]);
        assert_eq!(args.retry_connections, Some(false));

        let args = parse(&["ncio", "backup"]);
        assert_eq!(args.retry_connections, None);
    }

    #[test]
    #[serial]
    fn test_transform_options() {
        let args = parse(&[
            "ncio",
            "transform",
            "--input",
            "in.json",
            "--hostname",
            "master1.acme.com:master2.acme.com",
            "--hostname",
            "puppetdb1.acme.com:puppetdb2.acme.com",
        ]);

        match args.mode().unwrap() {
            ExecutionMode::Transform(config) => {
                assert_eq!(config.input, FileOption::Path(PathBuf::from("in.json")));
                assert_eq!(config.output, FileOption::Stdout);
                assert_eq!(config.transformer.matcher().as_str(), "^puppet_enterprise");
                let map = config.transformer.hostname_map();
                assert_eq!(map.lookup("master1.acme.com"), "master2.acme.com");
                assert_eq!(map.lookup("puppetdb1.acme.com"), "puppetdb2.acme.com");
                assert_eq!(map.lookup("web1.acme.com"), "web1.acme.com");
            }
            other => panic!("Expected Transform mode, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_invalid_hostname_mapping_is_rejected() {
        let result = Args::try_parse_from(["ncio", "transform", "--hostname", "nocolon"]);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_matcher_is_rejected() {
        let args = parse(&["ncio", "transform", "--matcher", "(unclosed"]);
        assert!(args.mode().is_err());
    }

    #[test]
    #[serial]
    fn test_global_options_from_environment() {
        // SAFETY: serialized with every other test that reads NCIO_* variables
        unsafe {
            std::env::set_var(env::vars::URI, "https://console.acme.com:4433/classifier-api/v1");
            std::env::set_var(env::vars::CACERT, "/opt/ssl/ca.pem");
            std::env::set_var(env::vars::RETRY_CONNECTIONS, "true");
        }
        let args = parse(&["ncio", "--cacert", "/flag/ca.pem", "backup"]);
        unsafe {
            std::env::remove_var(env::vars::URI);
            std::env::remove_var(env::vars::CACERT);
            std::env::remove_var(env::vars::RETRY_CONNECTIONS);
        }

        assert_eq!(
            args.uri.as_deref(),
            Some("https://console.acme.com:4433/classifier-api/v1")
        );
        assert_eq!(args.cacert, Some(PathBuf::from("/flag/ca.pem")));
        assert_eq!(args.retry_connections, Some(true));
    }

    #[test]
    fn test_no_command_error() {
        let args = Args {
            uri: None,
            cert: None,
            key: None,
            cacert: None,
            logto: None,
            debug: false,
            retry_connections: None,
            connect_timeout: None,
            config: None,
            command: None,
        };
        assert!(args.mode().is_err());
    }
}
