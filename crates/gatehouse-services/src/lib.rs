//! Gatehouse Services
//!
//! Operations exposed on the web endpoint, the request-scoped service
//! container they resolve their collaborators from, and the collaborator
//! traits themselves. Operations are registered with the host dispatcher,
//! which routes by method and path.

pub mod auth;
pub mod greeting;
pub mod scope;

pub use auth::{AuthenticationResult, AuthenticationService};
pub use scope::{ScopeError, ServiceProvider, ServiceScope};

use gatehouse_protocol::{HandlerResult, InboundRequest};
use http::Method;

/// Trait implemented by every operation on the web endpoint.
///
/// An operation handles exactly one `(method, path)` pair. The dispatcher
/// creates a fresh [`ServiceScope`] for every request and passes it in, so
/// anything resolved from `scope` lives only as long as that request.
pub trait Operation: Send + Sync {
    /// Operation name used in logs (e.g., "GetTest").
    fn name(&self) -> &str;

    /// HTTP method this operation answers.
    fn method(&self) -> Method;

    /// Path relative to the endpoint base (e.g., "/test").
    fn path(&self) -> &str;

    /// Handle one request.
    fn invoke(
        &self,
        scope: &ServiceScope,
        request: &InboundRequest,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;

    /// Initialize the operation (called once at startup).
    fn init(&self) -> impl std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send {
        async { Ok(()) }
    }

    /// Shutdown the operation (called once at server shutdown).
    fn shutdown(&self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}
