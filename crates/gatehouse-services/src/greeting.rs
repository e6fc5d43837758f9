//! Greeting operation, `GET /api/test`.

use chrono::Local;
use gatehouse_protocol::{HandlerResult, InboundRequest, Routes};
use http::Method;
use serde_json::json;
use tracing::info;

use crate::{Operation, ServiceScope};

/// Returns `"Hello World! <local time>"` as a JSON string.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreetingOperation;

impl GreetingOperation {
    pub fn new() -> Self {
        Self
    }

    fn greeting() -> String {
        format!("Hello World! {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

impl Operation for GreetingOperation {
    fn name(&self) -> &str {
        "GetTest"
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> &str {
        Routes::TEST
    }

    async fn invoke(&self, scope: &ServiceScope, _request: &InboundRequest) -> HandlerResult {
        info!(scope = %scope.id(), "Hello World! returned");
        Ok(json!(Self::greeting()))
    }
}
