//! CLI-specific functionality for ncio
//!
//! This module contains argument parsing, configuration discovery and the
//! resolution of both into read-only settings.

pub mod args;
pub mod config;

pub use args::{Args, BackupConfig, Commands, ExecutionMode, RestoreConfig, TransformConfig};
pub use config::{ConfigDiscovery, ConfigError, FileConfig, Settings};
