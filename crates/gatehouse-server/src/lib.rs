//! Gatehouse Server: dispatches endpoint requests through the inspector
//! pipeline to operations.
//!
//! The server owns the operations, the inspector pipeline and the root
//! service provider, and provides the `RequestHandler` implementation for
//! the transport layer.

pub mod context;
pub mod inspectors;
pub mod instance;
pub mod pipeline;
pub mod router;

pub use context::{RequestContext, ResponseContext};
pub use instance::HandlerInstance;
pub use pipeline::{
    Correlation, Correlations, Inspector, InspectorError, InspectorPipeline, Phase, PipelineError,
};
pub use router::HostServer;
