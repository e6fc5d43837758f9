//! Per-request handler state.

use std::time::{Duration, Instant};

use gatehouse_services::ServiceScope;
use uuid::Uuid;

/// The handler object created for a single request.
///
/// Owns the request's [`ServiceScope`]; dropping the instance releases every
/// service resolved during the request. Inspectors reach it through
/// [`RequestContext::instance`](crate::RequestContext::instance).
#[derive(Debug)]
pub struct HandlerInstance {
    scope: ServiceScope,
    /// Operation the request was routed to, if any
    operation: Option<String>,
    created_at: Instant,
}

impl HandlerInstance {
    pub fn new(scope: ServiceScope, operation: Option<String>) -> Self {
        Self {
            scope,
            operation,
            created_at: Instant::now(),
        }
    }

    /// Same as the scope id.
    pub fn id(&self) -> Uuid {
        self.scope.id()
    }

    /// Request-scoped services.
    pub fn services(&self) -> &ServiceScope {
        &self.scope
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}
