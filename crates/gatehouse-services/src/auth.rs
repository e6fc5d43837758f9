//! Authentication collaborator consulted by the auth inspector.

use std::collections::HashMap;

/// Credential presented on every request until real credential extraction exists.
pub const PLACEHOLDER_CREDENTIAL: &str = "anonymous-placeholder";

/// Successful authentication outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub principal: String,
}

/// Validates a credential. `None` means authentication failed.
pub trait AuthenticationService: Send + Sync {
    fn authenticate(&self, credential: &str) -> Option<AuthenticationResult>;
}

/// Rejects every credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllAuthenticationService;

impl AuthenticationService for DenyAllAuthenticationService {
    fn authenticate(&self, _credential: &str) -> Option<AuthenticationResult> {
        None
    }
}

/// Accepts a fixed token → principal table.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenAuthenticationService {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuthenticationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), principal.into());
        self
    }
}

impl AuthenticationService for StaticTokenAuthenticationService {
    fn authenticate(&self, credential: &str) -> Option<AuthenticationResult> {
        self.tokens.get(credential).map(|principal| AuthenticationResult {
            principal: principal.clone(),
        })
    }
}
