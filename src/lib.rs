//! # ncio
//!
//! Node Classification backup, restore and transform.
//!
//! Moves a classification hierarchy (a flat list of named groups with class
//! assignments, parameters and matching rules) in and out of a remote
//! classifier service over mutual TLS, and rewrites the hostnames embedded in
//! a captured hierarchy so it can be restored on a different cluster.
//!
//! ## Architecture Overview
//!
//! - **[`http`]**: one synchronous request/response exchange over mutual TLS
//! - **[`support::retry`]**: retry with exponential backoff, bounded by a total timeout
//! - **[`api`]**: the classifier API and the classification of its error responses
//! - **[`support::transform`]**: hostname rewriting of a captured hierarchy
//! - **[`cli`]** and **[`app`]**: the `ncio` command line tool
//!
//! ## Quick Start
//!
//! ```rust
//! use ncio::api::Hierarchy;
//! use ncio::support::{ClassMatcher, HostnameMap, Transformer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backup: Hierarchy = serde_json::from_str(
//!         r#"[{"name":"PE Master","rule":["=","name","master1.acme.com"],
//!             "classes":{"puppet_enterprise::profile::master":{"server":"master1.acme.com"}}}]"#,
//!     )?;
//!
//!     let map: HostnameMap = [("master1.acme.com", "master2.acme.com")].into_iter().collect();
//!     let transformer = Transformer::new(map, ClassMatcher::new("^puppet_enterprise")?);
//!
//!     let restored = transformer.transform(backup);
//!     assert_eq!(restored[0].rule().unwrap()[2], "master2.acme.com");
//!     Ok(())
//! }
//! ```

/// Environment constants and path utilities.
///
/// Centralizes the hardcoded paths, environment variable names and defaults
/// used throughout the application.
pub mod env;

/// Mutual TLS transport to the classifier service.
pub mod http;

/// Node Classifier API client and data model.
pub mod api;

/// Retry, transform, file option and logging support.
pub mod support;

// CLI module for command-line interface
pub mod cli;

/// Backup, restore and transform subcommands.
pub mod app;

pub use api::{ClassifierClient, ClientError, Group, Hierarchy, ValueNode};
pub use http::{ConnectionConfig, HttpClient, Transport, TransportError};
pub use support::{Fault, FaultKind, RetryAction, RetryError, RetryPolicy, Transformer};
