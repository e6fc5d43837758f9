//! Gatehouse - Protocol Types
//!
//! Transport-neutral types shared by every Gatehouse crate: the inbound
//! request and outbound response views, the fault model, the route table
//! constants, and the host configuration surface.

pub mod config;
pub mod error;
pub mod message;
pub mod routes;

pub use config::{ConfigError, HostConfig, KestrelOptions};
pub use error::{Fault, FaultCode};
pub use message::{InboundRequest, OutboundResponse};
pub use routes::Routes;

/// Result of invoking an operation: a JSON payload or a fault.
pub type HandlerResult = Result<serde_json::Value, Fault>;
