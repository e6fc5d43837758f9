//! Request and response views handed to inspectors.

use gatehouse_protocol::{InboundRequest, OutboundResponse};
use http::header::HeaderName;
use http::{HeaderMap, Method, StatusCode};

use crate::instance::HandlerInstance;
use crate::pipeline::InspectorError;

/// Read-only view of one inbound request.
///
/// Built per request by the dispatcher and dropped when the request
/// completes, which also drops the attached [`HandlerInstance`].
#[derive(Debug)]
pub struct RequestContext {
    request: InboundRequest,
    instance: Option<HandlerInstance>,
}

impl RequestContext {
    pub fn new(request: InboundRequest) -> Self {
        Self {
            request,
            instance: None,
        }
    }

    pub fn with_instance(mut self, instance: HandlerInstance) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn path(&self) -> &str {
        &self.request.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.request.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// The handler instance serving this request, when there is one.
    pub fn instance(&self) -> Option<&HandlerInstance> {
        self.instance.as_ref()
    }

    pub fn request(&self) -> &InboundRequest {
        &self.request
    }
}

/// Mutable view of the outbound response. Inspectors may add or overwrite headers.
#[derive(Debug)]
pub struct ResponseContext {
    response: OutboundResponse,
}

impl ResponseContext {
    pub fn new(response: OutboundResponse) -> Self {
        Self { response }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    /// Sets `name` to `value`, replacing any existing values.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> Result<(), InspectorError> {
        self.response
            .set_header(name.clone(), value)
            .map_err(|_| InspectorError::InvalidHeader(name.to_string()))
    }

    pub fn into_inner(self) -> OutboundResponse {
        self.response
    }
}
