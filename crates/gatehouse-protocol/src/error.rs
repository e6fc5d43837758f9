//! Fault model returned to clients when a request cannot be served.

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Fault categories plus their HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    // Routing
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,

    // Inspectors
    Unauthenticated,
    InspectorFailed,

    // Server lifecycle
    ServerNotInitialized,
    ServerShuttingDown,

    Internal,

    // Custom code
    Custom(i32),
}

impl FaultCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound => -32601,
            Self::MethodNotAllowed => -32602,
            Self::PayloadTooLarge => -32600,
            Self::Unauthenticated => -32010,
            Self::InspectorFailed => -32011,
            Self::ServerNotInitialized => -32001,
            Self::ServerShuttingDown => -32002,
            Self::Internal => -32603,
            Self::Custom(c) => *c,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -32601 => Self::NotFound,
            -32602 => Self::MethodNotAllowed,
            -32600 => Self::PayloadTooLarge,
            -32010 => Self::Unauthenticated,
            -32011 => Self::InspectorFailed,
            -32001 => Self::ServerNotInitialized,
            -32002 => Self::ServerShuttingDown,
            -32603 => Self::Internal,
            c => Self::Custom(c),
        }
    }

    /// HTTP status a fault of this kind is delivered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::ServerNotInitialized | Self::ServerShuttingDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::InspectorFailed | Self::Internal | Self::Custom(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Fault object serialised into the response body as `{"fault": {...}}`.
///
/// Codes -32603 through -32000 are reserved for the built-in kinds. A fault
/// built with [`Fault::new`] keeps its [`FaultCode`], so a `Custom` code that
/// collides with a reserved one still reports as `Custom`. A deserialized
/// fault has only the number and maps it back with [`FaultCode::from_code`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip)]
    kind: Option<FaultCode>,
}

impl Fault {
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
            kind: Some(code),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(FaultCode::NotFound, format!("No operation at {path}"))
    }

    pub fn method_not_allowed(method: &str, path: &str) -> Self {
        Self::new(
            FaultCode::MethodNotAllowed,
            format!("Method {method} is not allowed on {path}"),
        )
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            FaultCode::PayloadTooLarge,
            format!("Request body exceeds {limit} bytes"),
        )
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(FaultCode::Unauthenticated, message)
    }

    pub fn inspector_failed(inspector: &str, message: impl std::fmt::Display) -> Self {
        Self::new(
            FaultCode::InspectorFailed,
            format!("Inspector '{inspector}' failed: {message}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FaultCode::Internal, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(FaultCode::ServerNotInitialized, "Server is not initialized")
    }

    pub fn shutting_down() -> Self {
        Self::new(FaultCode::ServerShuttingDown, "Server is shutting down")
    }

    pub fn fault_code(&self) -> FaultCode {
        self.kind.unwrap_or_else(|| FaultCode::from_code(self.code))
    }

    pub fn status(&self) -> StatusCode {
        self.fault_code().status()
    }

    /// JSON body the hosting layer sends for this fault.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({ "fault": self })
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fault [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for Fault {}
