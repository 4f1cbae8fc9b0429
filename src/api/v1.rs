//! Node Classifier API version 1.
//!
//! Implements the two operations needed to move a classification hierarchy
//! in and out of the service:
//!
//! - `GET /classifier-api/v1/groups?inherited=<bool>` via [`ClassifierClient::groups`]
//! - `POST /classifier-api/v1/import-hierarchy` via [`ClassifierClient::import_hierarchy`]
//!
//! Every non-success response is turned into a [`ClientError`]; nothing is
//! ever returned as a value for an unexpected status code.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ncio::api::ClassifierClient;
//! use ncio::http::ConnectionConfig;
//! use ncio::support::{FaultKind, RetryPolicy};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let uri = url::Url::parse("https://master1.puppet.vm:4433/classifier-api/v1")?;
//!     let config = ConnectionConfig::from_uri(
//!         &uri,
//!         "/etc/puppetlabs/puppet/ssl/certs/pe-internal-orchestrator.pem",
//!         "/etc/puppetlabs/puppet/ssl/private_keys/pe-internal-orchestrator.pem",
//!         "/etc/puppetlabs/puppet/ssl/certs/ca.pem",
//!     )?;
//!     let retry = RetryPolicy::new(Duration::from_secs(120)).retry_on(FaultKind::ConnectionRefused);
//!     let client = ClassifierClient::connect(config, Some(retry))?;
//!
//!     let groups = client.groups(false)?;
//!     println!("{} groups", groups.len());
//!     Ok(())
//! }
//! ```

use crate::api::types::{ClientError, Hierarchy};
use crate::env;
use crate::http::{Body, BodyStream, ConnectionConfig, HttpClient, Method, Request, Response, Transport};
use crate::support::retry::{RetryAction, RetryPolicy};
use regex::Regex;
use serde_json::Value;
use std::io::Read;
use std::sync::LazyLock;
use tracing::{Span, debug, info};

/// Signature of the RBAC "user unauthenticated" error body.
static UNAUTHENTICATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rbac/user-unauthenticated").expect("static regex is valid"));

pub const DEFAULT_AUTH_MESSAGE: &str = "401 User Unauthenticated Error";

#[derive(Debug)]
pub struct ClassifierClient<T: Transport = HttpClient> {
    transport: T,
    base_path: String,
    retry: Option<RetryAction>,
    span: Span,
}

impl ClassifierClient<HttpClient> {
    /// Build the HTTP connection and, when `retry` is given, route every
    /// request through a [`RetryAction`] with that policy.
    pub fn connect(config: ConnectionConfig, retry: Option<RetryPolicy>) -> Result<Self, ClientError> {
        let base_path = config.base_path.clone();
        let transport = HttpClient::connect(config)?;
        let client = Self::new(transport).with_base_path(base_path);
        Ok(match retry {
            Some(policy) => client.with_retry(policy),
            None => client,
        })
    }
}

impl<T: Transport> ClassifierClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            base_path: env::API_BASE_PATH.to_string(),
            retry: None,
            span: tracing::info_span!("classifier"),
        }
    }

    /// Path prefix of the API, `/classifier-api/v1` unless the service URI says otherwise.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(self, policy: RetryPolicy) -> Self {
        let retry = RetryAction::new(policy);
        self.with_retry_action(retry)
    }

    pub fn with_retry_action(mut self, retry: RetryAction) -> Self {
        let span = self.span.clone();
        self.retry = Some(retry.with_span(span));
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        if let Some(retry) = self.retry.take() {
            self.retry = Some(retry.with_span(self.span.clone()));
        }
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry.is_some()
    }

    /// Return all groups currently defined in the classifier.
    ///
    /// With `inherited` set, groups include the classes, parameters and
    /// variables inherited from their ancestors.
    pub fn groups(&self, inherited: bool) -> Result<Hierarchy, ClientError> {
        let path = self.api_path("groups");
        let response = self.request(None, || {
            Ok(Request::new(Method::Get, path.as_str())
                .query("inherited", inherited.to_string())
                .header("Content-Type", "application/json"))
        })?;

        if response.status != 200 {
            return Err(raise_on_non_success(&response, 200));
        }

        let groups: Hierarchy = serde_json::from_str(&response.body)?;
        debug!(parent: &self.span, count = groups.len(), "Retrieved groups");
        Ok(groups)
    }

    /// Stream a hierarchy to the import endpoint using chunked transfer
    /// encoding. Returns `true` once the service answers 204.
    ///
    /// The stream is forwarded as it is read and never buffered. A retry is
    /// only possible while no byte of it has been consumed.
    pub fn import_hierarchy<R: Read + Send + 'static>(&self, stream: R) -> Result<bool, ClientError> {
        let path = self.api_path("import-hierarchy");
        let body = BodyStream::new(stream);

        let response = self.request(Some(&body), || {
            Ok(Request::new(Method::Post, path.as_str())
                .header("Content-Type", "application/json")
                .header("Transfer-Encoding", "chunked")
                .body(Body::Stream(body.clone())))
        })?;

        if response.status != 204 {
            return Err(raise_on_non_success(&response, 204));
        }

        info!(parent: &self.span, bytes = body.bytes_read(), "Imported hierarchy");
        Ok(true)
    }

    fn api_path(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_path, endpoint)
    }

    /// Send the request produced by `build`, retrying per the configured policy.
    ///
    /// A failure after any byte of `body` was read is final, so no backoff is
    /// spent on a request that can never be replayed.
    fn request<F>(&self, body: Option<&BodyStream>, mut build: F) -> Result<Response, ClientError>
    where
        F: FnMut() -> Result<Request, ClientError>,
    {
        let mut attempt = || -> Result<Response, ClientError> {
            let request = build()?;
            debug!(parent: &self.span, method = ?request.method, path = %request.path, "Request");
            self.transport.send(request).map_err(|source| {
                match body.map(BodyStream::bytes_read) {
                    Some(bytes) if bytes > 0 => ClientError::BodyConsumed { bytes, source },
                    _ => ClientError::Transport(source),
                }
            })
        };

        match &self.retry {
            Some(retry) => retry.run(attempt).map_err(ClientError::from),
            None => attempt(),
        }
    }
}

/// Classify a response whose status differs from `expected`.
pub fn raise_on_non_success(response: &Response, expected: u16) -> ClientError {
    if response.status == 401 && UNAUTHENTICATED.is_match(&response.body) {
        let message = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|body| body.get("msg").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_AUTH_MESSAGE.to_string());
        ClientError::Authentication(message)
    } else {
        ClientError::Api {
            expected,
            actual: response.status,
            body: response.body.clone(),
        }
    }
}
