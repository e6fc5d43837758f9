//! Built-in inspectors.

pub mod auth;
pub mod origin;

pub use auth::{AuthInspector, AuthPolicy};
pub use origin::{DEFAULT_ALLOWED_ORIGINS, OriginInspector};
