//! Transport layer: a single mutual TLS request/response exchange.

pub mod client;
pub mod types;

pub use client::{HttpClient, Transport};
pub use types::{Body, BodyStream, ConnectionConfig, Method, Request, Response, TransportError};
