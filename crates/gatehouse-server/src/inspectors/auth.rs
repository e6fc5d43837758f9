//! Authentication inspector.
//!
//! Consults the request-scoped [`AuthenticationService`] with the configured
//! credential before every request. Under [`AuthPolicy::Observe`] (the
//! default) a failed authentication is logged and the request proceeds
//! unchanged; under [`AuthPolicy::Enforce`] it fails the request.
//!
//! Two predicates let a request bypass the check: one for meta endpoints and
//! one for requests that carry their own authentication scheme. Both default
//! to "never".

use std::sync::Arc;

use gatehouse_services::auth::PLACEHOLDER_CREDENTIAL;
use gatehouse_services::{AuthenticationResult, AuthenticationService};
use tracing::{debug, error};

use crate::context::RequestContext;
use crate::pipeline::{Correlation, Inspector, InspectorError};

/// Per-request boolean decision over the inbound request.
pub type RequestPredicate = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// What an authentication failure does to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPolicy {
    /// Log the failure; the request still reaches the operation.
    #[default]
    Observe,
    /// Fail the request as unauthenticated.
    Enforce,
}

pub struct AuthInspector {
    policy: AuthPolicy,
    credential: String,
    is_meta_endpoint: RequestPredicate,
    uses_custom_authentication: RequestPredicate,
}

impl AuthInspector {
    pub fn new() -> Self {
        Self {
            policy: AuthPolicy::default(),
            credential: PLACEHOLDER_CREDENTIAL.to_string(),
            is_meta_endpoint: Arc::new(|_| false),
            uses_custom_authentication: Arc::new(|_| false),
        }
    }

    pub fn with_policy(mut self, policy: AuthPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    pub fn with_meta_endpoint(
        mut self,
        predicate: impl Fn(&RequestContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_meta_endpoint = Arc::new(predicate);
        self
    }

    pub fn with_custom_authentication(
        mut self,
        predicate: impl Fn(&RequestContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.uses_custom_authentication = Arc::new(predicate);
        self
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }
}

impl Default for AuthInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector for AuthInspector {
    /// Authentication outcome; `None` when it failed.
    type State = Option<AuthenticationResult>;

    fn name(&self) -> &str {
        "auth"
    }

    fn requires_instance(&self) -> bool {
        true
    }

    fn applies_to(&self, request: &RequestContext) -> bool {
        !(self.is_meta_endpoint)(request) && !(self.uses_custom_authentication)(request)
    }

    fn before(&self, request: &RequestContext) -> Result<Correlation<Self::State>, InspectorError> {
        let Some(instance) = request.instance() else {
            return Ok(Correlation::Skipped);
        };

        let service = instance.services().resolve::<dyn AuthenticationService>()?;
        let outcome = service.authenticate(&self.credential);

        match &outcome {
            Some(result) => {
                debug!(principal = %result.principal, path = request.path(), "Request authenticated");
            }
            None => {
                error!(path = request.path(), "Auth failed for {}", self.credential);
                if self.policy == AuthPolicy::Enforce {
                    return Err(InspectorError::Unauthenticated(self.credential.clone()));
                }
            }
        }

        Ok(Correlation::Ran(outcome))
    }
}
