//! Authentication module.
//!
//! Provides JWT validation middleware with support for:
//! - HS256 session tokens issued at login
//! - Dev bypass mode with configurable staff users
//! - Role capability checks used by handlers and extractors

mod claims;
mod config;
mod error;
mod middleware;

pub use claims::{Capability, Claims, Role};
pub use config::{AuthConfig, ConfigValidationError, DevUser};
pub use error::AuthError;
pub use middleware::{
    AUTH_COOKIE, AuthState, CurrentUser, RequireAdmin, RequireClinician,
    RequireConsultationAccess, RequireMember, auth_middleware,
};
