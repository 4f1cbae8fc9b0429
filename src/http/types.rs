use crate::support::retry::{Fault, FaultKind};
use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

/// Everything needed to reach the classifier service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    /// API path prefix taken from the URI, without a trailing slash
    pub base_path: String,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub cacert: PathBuf,
}

impl ConnectionConfig {
    /// Take host, port and scheme from a service URI such as
    /// `https://master1.puppet.vm:4433/classifier-api/v1`.
    pub fn from_uri(
        uri: &Url,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
        cacert: impl Into<PathBuf>,
    ) -> Result<Self, TransportError> {
        let use_ssl = match uri.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(TransportError::Configuration(format!(
                    "Unsupported URI scheme '{}' in {}",
                    other, uri
                )));
            }
        };
        let host = uri
            .host_str()
            .ok_or_else(|| TransportError::Configuration(format!("URI has no host: {}", uri)))?
            .to_string();
        let port = uri
            .port_or_known_default()
            .ok_or_else(|| TransportError::Configuration(format!("URI has no port: {}", uri)))?;

        Ok(Self {
            host,
            port,
            use_ssl,
            base_path: uri.path().trim_end_matches('/').to_string(),
            cert: cert.into(),
            key: key.into(),
            cacert: cacert.into(),
        })
    }

    pub fn protocol(&self) -> &'static str {
        if self.use_ssl { "https" } else { "http" }
    }

    /// Base URL of the endpoint, without any path.
    pub fn base_url(&self) -> Result<Url, TransportError> {
        let text = format!("{}://{}:{}", self.protocol(), self.host, self.port);
        Url::parse(&text)
            .map_err(|e| TransportError::Configuration(format!("Invalid endpoint {}: {}", text, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }
}

#[derive(Debug)]
pub enum Body {
    Empty,
    Stream(BodyStream),
}

/// A request body read incrementally from an unbounded source.
///
/// Clones share the underlying reader and the count of bytes consumed, so a
/// caller can hand a clone to each attempt and still tell whether any byte
/// has left the source.
#[derive(Clone)]
pub struct BodyStream {
    reader: Arc<Mutex<Box<dyn Read + Send>>>,
    consumed: Arc<AtomicU64>,
}

impl BodyStream {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Box::new(reader))),
            consumed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.consumed.load(Ordering::SeqCst)
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| io::Error::other("request body reader is poisoned"))?;
        let read = reader.read(buf)?;
        self.consumed.fetch_add(read as u64, Ordering::SeqCst);
        Ok(read)
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("bytes_read", &self.bytes_read())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),
    #[error("Connection reset: {0}")]
    ConnectionReset(String),
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Invalid connection configuration: {0}")]
    Configuration(String),
    #[error("Request failed: {0}")]
    Other(String),
}

impl Fault for TransportError {
    fn kind(&self) -> FaultKind {
        match self {
            TransportError::ConnectionRefused(_) => FaultKind::ConnectionRefused,
            TransportError::ConnectionReset(_) => FaultKind::ConnectionReset,
            TransportError::Connect(_) => FaultKind::Connect,
            TransportError::Timeout(_) => FaultKind::RequestTimeout,
            TransportError::Configuration(_) => FaultKind::Configuration,
            TransportError::Other(_) => FaultKind::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_https_uri() {
        let uri = Url::parse("https://foo.acme.mock:14433/classifier-api/v1").unwrap();
        let config =
            ConnectionConfig::from_uri(&uri, "/tmp/cert.pem", "/tmp/key.pem", "/tmp/ca.pem")
                .unwrap();

        assert_eq!(config.host, "foo.acme.mock");
        assert_eq!(config.port, 14433);
        assert!(config.use_ssl);
        assert_eq!(config.protocol(), "https");
        assert_eq!(config.cert, PathBuf::from("/tmp/cert.pem"));
        assert_eq!(config.base_path, "/classifier-api/v1");
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://foo.acme.mock:14433/"
        );
    }

    #[test]
    fn test_config_from_http_uri_uses_default_port() {
        let uri = Url::parse("http://localhost/classifier-api/v1").unwrap();
        let config = ConnectionConfig::from_uri(&uri, "c", "k", "ca").unwrap();
        assert!(!config.use_ssl);
        assert_eq!(config.port, 80);
    }

    #[test]
    fn test_config_base_path_drops_trailing_slash() {
        let uri = Url::parse("http://127.0.0.1:8080/").unwrap();
        let config = ConnectionConfig::from_uri(&uri, "c", "k", "ca").unwrap();
        assert_eq!(config.base_path, "");

        let uri = Url::parse("https://console:4433/nc/v1/").unwrap();
        let config = ConnectionConfig::from_uri(&uri, "c", "k", "ca").unwrap();
        assert_eq!(config.base_path, "/nc/v1");
    }

    #[test]
    fn test_config_rejects_unknown_scheme() {
        let uri = Url::parse("ftp://foo.acme.mock/").unwrap();
        let err = ConnectionConfig::from_uri(&uri, "c", "k", "ca").unwrap_err();
        assert_eq!(err.kind(), FaultKind::Configuration);
    }

    #[test]
    fn test_body_stream_counts_shared_reads() {
        let stream = BodyStream::new(&b"[{\"name\":\"g\"}]"[..]);
        let mut first = stream.clone();

        assert_eq!(stream.bytes_read(), 0);
        let mut buf = [0u8; 4];
        first.read_exact(&mut buf).unwrap();

        assert_eq!(&buf, b"[{\"n");
        assert_eq!(stream.bytes_read(), 4);
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(Method::Get, "/classifier-api/v1/groups")
            .query("inherited", "false")
            .header("Content-Type", "application/json");

        assert_eq!(request.query, vec![("inherited".into(), "false".into())]);
        assert_eq!(
            request.headers,
            vec![("Content-Type".into(), "application/json".into())]
        );
        assert!(matches!(request.body, Body::Empty));
    }
}
