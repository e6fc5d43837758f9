//! Allow-list CORS inspector.
//!
//! A request takes part when its `Origin` header contains one of the
//! configured allow-list entries as a substring (`"192.168."` matches
//! `"http://192.168.1.5:9000"`). Matching is case-sensitive. For those
//! requests the response echoes the origin in `Access-Control-Allow-Origin`,
//! and a preflight (`OPTIONS`) also gets `Access-Control-Allow-Headers`
//! copied from `Access-Control-Request-Headers`.
//!
//! Like every handler-bound inspector it only runs when the request carries a
//! [`HandlerInstance`](crate::HandlerInstance).

use http::Method;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN,
};

use crate::context::{RequestContext, ResponseContext};
use crate::pipeline::{Correlation, Inspector, InspectorError};

/// Origins allowed by the host's default wiring.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["192.168.", "localhost"];

pub struct OriginInspector {
    allowed: Vec<String>,
}

impl OriginInspector {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Whether `origin` contains any allow-list entry.
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed.iter().any(|entry| origin.contains(entry.as_str()))
    }

    fn origin(request: &RequestContext) -> Option<&str> {
        request.header(ORIGIN.as_str()).filter(|o| !o.is_empty())
    }
}

impl Inspector for OriginInspector {
    /// The request's `Origin` value.
    type State = String;

    fn name(&self) -> &str {
        "origin"
    }

    fn requires_instance(&self) -> bool {
        true
    }

    fn applies_to(&self, request: &RequestContext) -> bool {
        Self::origin(request).is_some_and(|origin| self.is_allowed(origin))
    }

    fn before(&self, request: &RequestContext) -> Result<Correlation<String>, InspectorError> {
        Ok(match Self::origin(request) {
            Some(origin) => Correlation::Ran(origin.to_owned()),
            None => Correlation::Skipped,
        })
    }

    fn after(
        &self,
        response: &mut ResponseContext,
        request: &RequestContext,
        origin: String,
    ) -> Result<(), InspectorError> {
        response.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, &origin)?;

        if *request.method() == Method::OPTIONS {
            if let Some(requested) = request.header(ACCESS_CONTROL_REQUEST_HEADERS.as_str()) {
                response.set_header(ACCESS_CONTROL_ALLOW_HEADERS, requested)?;
            }
        }
        Ok(())
    }
}
