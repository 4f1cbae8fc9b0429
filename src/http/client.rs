//! Mutual TLS HTTP transport for the classifier service.
//!
//! The underlying [`reqwest::blocking::Client`] is built exactly once in
//! [`HttpClient::connect`] and reused for every request made through that
//! instance. With TLS enabled the peer must validate against the supplied CA
//! bundle only, and the client always presents its certificate and key.

use crate::http::types::{Body, ConnectionConfig, Method, Request, Response, TransportError};
use reqwest::{Certificate, Identity};
use std::error::Error as StdError;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A single request/response exchange with the remote service.
pub trait Transport {
    fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[derive(Debug)]
pub struct HttpClient {
    base_url: Url,
    client: reqwest::blocking::Client,
}

impl HttpClient {
    /// Read the certificate material and build the connection.
    ///
    /// Unreadable or unparsable cert, key or CA files are configuration
    /// errors and are never retried.
    pub fn connect(config: ConnectionConfig) -> Result<Self, TransportError> {
        let base_url = config.base_url()?;

        let mut builder = reqwest::blocking::Client::builder().timeout(None::<Duration>);

        if config.use_ssl {
            let identity = load_identity(&config.cert, &config.key)?;
            let roots = load_ca_bundle(&config.cacert)?;

            builder = builder
                .use_rustls_tls()
                .tls_built_in_root_certs(false)
                .identity(identity)
                .https_only(true);
            for root in roots {
                builder = builder.add_root_certificate(root);
            }
        }

        let client = builder.build().map_err(|e| {
            TransportError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        debug!(
            host = %config.host,
            port = config.port,
            use_ssl = config.use_ssl,
            "HTTP client connected"
        );

        Ok(Self {
            base_url,
            client,
        })
    }

    /// Base URI of the service this client talks to.
    pub fn uri(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &Request) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&request.path);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        url
    }
}

impl Transport for HttpClient {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.url_for(&request);
        debug!(method = ?request.method, %url, "Sending request");

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Body::Stream(stream) = request.body {
            builder = builder.body(reqwest::blocking::Body::new(stream));
        }

        let response = builder.send().map_err(|e| classify_error(&e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| classify_error(&e))?;

        debug!(status, bytes = body.len(), "Received response");
        Ok(Response { status, body })
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>, TransportError> {
    fs::read(path).map_err(|e| {
        TransportError::Configuration(format!(
            "Failed to read {} {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

fn load_identity(cert: &Path, key: &Path) -> Result<Identity, TransportError> {
    let mut pem = read_pem(key, "client key")?;
    pem.push(b'\n');
    pem.extend(read_pem(cert, "client certificate")?);

    Identity::from_pem(&pem).map_err(|e| {
        TransportError::Configuration(format!(
            "Invalid client certificate {} or key {}: {}",
            cert.display(),
            key.display(),
            e
        ))
    })
}

fn load_ca_bundle(cacert: &Path) -> Result<Vec<Certificate>, TransportError> {
    let pem = read_pem(cacert, "CA certificate")?;
    let roots = Certificate::from_pem_bundle(&pem).map_err(|e| {
        TransportError::Configuration(format!(
            "Invalid CA certificate {}: {}",
            cacert.display(),
            e
        ))
    })?;
    if roots.is_empty() {
        return Err(TransportError::Configuration(format!(
            "No certificates found in CA file {}",
            cacert.display()
        )));
    }
    Ok(roots)
}

/// Find the innermost I/O error kind in an error's source chain.
fn io_error_kind(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}

/// Map an I/O error kind observed while talking to the service onto a transport fault.
pub(crate) fn classify_io_kind(kind: io::ErrorKind, message: String) -> Option<TransportError> {
    match kind {
        io::ErrorKind::ConnectionRefused => Some(TransportError::ConnectionRefused(message)),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => Some(TransportError::ConnectionReset(message)),
        io::ErrorKind::TimedOut => Some(TransportError::Timeout(message)),
        _ => None,
    }
}

fn classify_error(error: &reqwest::Error) -> TransportError {
    let message = error_chain(error);

    if let Some(classified) = io_error_kind(error).and_then(|kind| classify_io_kind(kind, message.clone())) {
        return classified;
    }
    if error.is_timeout() {
        TransportError::Timeout(message)
    } else if error.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Other(message)
    }
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        message.push_str(": ");
        message.push_str(&err.to_string());
        current = err.source();
    }
    message
}
