//! Host dispatcher: runs endpoint requests through the inspector pipeline
//! and routes them to operations.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use gatehouse_protocol::{Fault, HandlerResult, InboundRequest, OutboundResponse, Routes};
use gatehouse_services::auth::DenyAllAuthenticationService;
use gatehouse_services::greeting::GreetingOperation;
use gatehouse_services::{AuthenticationService, Operation, ServiceProvider, ServiceScope};
use gatehouse_transport::RequestHandler;
use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::context::{RequestContext, ResponseContext};
use crate::inspectors::{AuthInspector, DEFAULT_ALLOWED_ORIGINS, OriginInspector};
use crate::instance::HandlerInstance;
use crate::pipeline::{InspectorError, InspectorPipeline, PipelineError};

/// The host: owns the operations, the inspector pipeline and the root
/// service provider.
pub struct HostServer {
    provider: Arc<ServiceProvider>,
    pipeline: InspectorPipeline,
    operations: Vec<RegisteredOperation>,
    state: RwLock<ServerState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Uninitialized,
    Running,
    Shutdown,
}

struct RegisteredOperation {
    /// Full path including the endpoint base
    path: String,
    method: Method,
    op: Box<dyn OperationDyn>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe wrapper for the Operation trait.
trait OperationDyn: Send + Sync {
    fn name_dyn(&self) -> &str;
    fn invoke_dyn<'a>(
        &'a self,
        scope: &'a ServiceScope,
        request: &'a InboundRequest,
    ) -> BoxFuture<'a, HandlerResult>;
    fn init_dyn(&self) -> BoxFuture<'_, Result<(), Box<dyn std::error::Error + Send + Sync>>>;
    fn shutdown_dyn(&self) -> BoxFuture<'_, ()>;
}

impl<T: Operation> OperationDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }
    fn invoke_dyn<'a>(
        &'a self,
        scope: &'a ServiceScope,
        request: &'a InboundRequest,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(self.invoke(scope, request))
    }
    fn init_dyn(&self) -> BoxFuture<'_, Result<(), Box<dyn std::error::Error + Send + Sync>>> {
        Box::pin(self.init())
    }
    fn shutdown_dyn(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.shutdown())
    }
}

/// Where a request under the endpoint goes.
enum Route {
    Operation(usize),
    /// `OPTIONS` on a known path; carries the `Allow` value
    Preflight(String),
    MethodNotAllowed,
    NotFound,
}

impl HostServer {
    pub fn new(provider: Arc<ServiceProvider>, pipeline: InspectorPipeline) -> Self {
        Self {
            provider,
            pipeline,
            operations: Vec::new(),
            state: RwLock::new(ServerState::Uninitialized),
        }
    }

    /// The standard host: deny-all authentication scoped per request, the
    /// auth then origin inspectors, and the greeting operation.
    pub fn with_defaults() -> Self {
        let mut provider = ServiceProvider::new();
        provider.register_scoped::<dyn AuthenticationService, _>(|_| {
            Arc::new(DenyAllAuthenticationService) as Arc<dyn AuthenticationService>
        });

        let pipeline = InspectorPipeline::builder()
            .with(AuthInspector::new())
            .with(OriginInspector::new(DEFAULT_ALLOWED_ORIGINS))
            .build();

        let mut host = Self::new(Arc::new(provider), pipeline);
        host.register_operation(GreetingOperation::new());
        host
    }

    /// Register an operation under the endpoint base path.
    pub fn register_operation<O: Operation + 'static>(&mut self, operation: O) {
        let path = Routes::operation(operation.path());
        let method = operation.method();
        info!("Registering operation: {} {} ({})", method, path, operation.name());
        self.operations.push(RegisteredOperation {
            path,
            method,
            op: Box::new(operation),
        });
    }

    /// Initialize all operations and start accepting requests.
    pub async fn initialize(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Initializing host (inspectors: {:?}, services: {:?})",
            self.pipeline.names(),
            self.provider.registered()
        );

        for registered in &self.operations {
            registered.op.init_dyn().await?;
        }

        *self.state.write() = ServerState::Running;
        info!("Host initialized ({} operations)", self.operations.len());
        Ok(())
    }

    /// Shutdown all operations. Later requests are refused.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write();
            if *state == ServerState::Shutdown {
                return;
            }
            *state = ServerState::Shutdown;
        }

        info!("Shutting down host...");
        for registered in &self.operations {
            registered.op.shutdown_dyn().await;
        }
        info!("Host shutdown complete");
    }

    pub fn pipeline(&self) -> &InspectorPipeline {
        &self.pipeline
    }

    pub fn provider(&self) -> &Arc<ServiceProvider> {
        &self.provider
    }

    /// Operation routes as `(method, path)` in registration order.
    pub fn routes(&self) -> Vec<(Method, &str)> {
        self.operations
            .iter()
            .map(|r| (r.method.clone(), r.path.as_str()))
            .collect()
    }

    fn route(&self, method: &Method, path: &str) -> Route {
        let matching: Vec<(usize, &RegisteredOperation)> = self
            .operations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.path == path)
            .collect();

        if matching.is_empty() {
            return Route::NotFound;
        }
        if let Some((index, _)) = matching.iter().find(|(_, r)| r.method == *method) {
            return Route::Operation(*index);
        }
        if *method == Method::OPTIONS {
            let mut allow: Vec<&str> = matching.iter().map(|(_, r)| r.method.as_str()).collect();
            allow.push(Method::OPTIONS.as_str());
            return Route::Preflight(allow.join(", "));
        }
        Route::MethodNotAllowed
    }

    /// Produce the response for a routed request. Faults become responses.
    async fn dispatch(&self, route: Route, context: &RequestContext) -> OutboundResponse {
        match route {
            Route::Operation(index) => {
                let registered = &self.operations[index];
                let Some(instance) = context.instance() else {
                    return OutboundResponse::fault(&Fault::internal("no handler instance"));
                };
                match registered
                    .op
                    .invoke_dyn(instance.services(), context.request())
                    .await
                {
                    Ok(value) => OutboundResponse::json(&value),
                    Err(fault) => {
                        warn!(operation = registered.op.name_dyn(), "Operation fault: {}", fault);
                        OutboundResponse::fault(&fault)
                    }
                }
            }
            Route::Preflight(allow) => {
                let mut response = OutboundResponse::empty(StatusCode::NO_CONTENT);
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers.insert(ALLOW, value);
                }
                response
            }
            Route::MethodNotAllowed => OutboundResponse::fault(&Fault::method_not_allowed(
                context.method().as_str(),
                context.path(),
            )),
            Route::NotFound => OutboundResponse::fault(&Fault::not_found(context.path())),
        }
    }
}

/// Maps a pipeline failure to the fault surfaced by the hosting layer.
fn pipeline_fault(err: PipelineError) -> Fault {
    match err.source {
        InspectorError::Unauthenticated(credential) => {
            Fault::unauthenticated(format!("Authentication failed for {credential}"))
        }
        source => Fault::inspector_failed(&err.inspector, source),
    }
}

impl RequestHandler for HostServer {
    async fn handle_request(&self, request: InboundRequest) -> Result<OutboundResponse, Fault> {
        match *self.state.read() {
            ServerState::Shutdown => return Err(Fault::shutting_down()),
            ServerState::Uninitialized => return Err(Fault::not_initialized()),
            ServerState::Running => {}
        }

        if !Routes::is_endpoint_path(&request.path) {
            return Err(Fault::not_found(&request.path));
        }

        let route = self.route(&request.method, &request.path);
        let operation = match &route {
            Route::Operation(index) => Some(self.operations[*index].op.name_dyn().to_string()),
            _ => None,
        };

        // Dropping the context at the end of this call releases the scope.
        let instance = HandlerInstance::new(self.provider.create_scope(), operation);
        let context = RequestContext::new(request).with_instance(instance);
        debug!(method = %context.method(), path = context.path(), "Dispatching request");

        let correlations = self.pipeline.on_request(&context).map_err(|err| {
            warn!("Request rejected: {}", err);
            pipeline_fault(err)
        })?;

        let mut response = ResponseContext::new(self.dispatch(route, &context).await);

        self.pipeline
            .on_response(&mut response, &context, correlations)
            .map_err(|err| {
                warn!("Response inspection failed: {}", err);
                pipeline_fault(err)
            })?;

        Ok(response.into_inner())
    }
}
