//! Gatehouse Transport Layer
//!
//! The hosting layer in front of the dispatcher:
//! - HTTP and HTTPS listeners (axum on axum-server, rustls for TLS)
//! - Request/response conversion and fault rendering
//! - Health endpoint and graceful shutdown
//! - TLS certificate resolution and self-signed provisioning
//!
//! The transport is decoupled from the dispatcher via the `RequestHandler` trait.

pub mod certificate;
pub mod server;

pub use certificate::{Certificate, CertificateError, CertificateProvider};
pub use server::{RequestHandler, TlsConfig, TransportConfig, TransportError, TransportServer};
