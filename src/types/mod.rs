//! Type definitions for keycloak-auth
//!
//! Configuration, decoded token claims, state/status enums and identifiers.

// Module declarations
pub mod config;
pub mod identifiers;
pub mod status;
pub mod token;

pub use config::{
    AuthConfig, AuthConfigBuilder, ClientRoles, DEFAULT_ACCESS_DENIED_URL,
    DEFAULT_ACCESS_TOKEN_EXPIRATION_SECS, DEFAULT_REFRESH_MARGIN_SECS, MAX_DURATION_SECS,
    RequiredRoles,
};
pub use identifiers::SubscriptionId;
pub use status::{AuthState, AuthStatus};
pub use token::{RealmAccess, ResourceAccess, TokenDecodeError, TokenParsed};
