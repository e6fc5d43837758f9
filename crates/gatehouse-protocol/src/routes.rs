//! Route constants for the single web endpoint and its operations.

/// Paths served by the host.
pub struct Routes;

impl Routes {
    /// Base path of the inspected web endpoint.
    pub const ENDPOINT: &str = "/api";

    // ── Operations (relative to ENDPOINT) ───────────────────────────────
    pub const TEST: &str = "/test";

    // ── Served by the transport, outside the endpoint ───────────────────
    pub const HEALTH: &str = "/health";

    /// Joins the endpoint base with an operation path.
    pub fn operation(path: &str) -> String {
        format!("{}/{}", Self::ENDPOINT, path.trim_start_matches('/'))
    }

    /// Whether `path` falls under the inspected endpoint.
    pub fn is_endpoint_path(path: &str) -> bool {
        path == Self::ENDPOINT
            || path
                .strip_prefix(Self::ENDPOINT)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
