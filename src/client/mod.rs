//! Identity client seam
//!
//! The identity-provider protocol (redirect flows, PKCE, signature
//! validation) lives behind [`IdentityClient`]. The state machine only calls
//! these operations and interprets their results.

pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::types::TokenParsed;

/// Errors reported by an identity client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityClientError {
    /// The provider rejected the session (expired, revoked, invalid grant)
    #[error("Session rejected by identity provider: {0}")]
    Rejected(String),

    /// The provider could not be reached
    #[error("Identity provider unreachable: {0}")]
    Network(String),

    /// Any other client failure
    #[error("Identity client error: {0}")]
    Internal(String),
}

impl IdentityClientError {
    /// Create a rejected-session error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the provider rejected the session, as opposed to failing
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// What the identity client does on initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnLoad {
    /// Redirect to the login page unless already authenticated
    #[default]
    LoginRequired,
    /// Only check for an existing session
    CheckSso,
}

/// Options passed to [`IdentityClient::init`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOptions {
    /// Load behavior
    pub on_load: OnLoad,
}

impl InitOptions {
    /// `login-required` initialization
    #[must_use]
    pub fn login_required() -> Self {
        Self {
            on_load: OnLoad::LoginRequired,
        }
    }
}

/// Identity client driven by the authorization state machine
///
/// `init` and `update_token` are one-shot operations; the state machine never
/// aborts them, it only stops scheduling further work.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Initialize the session; `Ok(true)` iff the user is now authenticated
    ///
    /// May redirect to an external login page before resolving.
    ///
    /// # Errors
    /// Returns error if the provider rejects the session or the client fails
    async fn init(&self, options: InitOptions) -> Result<bool, IdentityClientError>;

    /// Refresh the token if it expires within `min_validity_secs`;
    /// `Ok(true)` iff a valid token is available afterwards
    ///
    /// # Errors
    /// Returns error if the provider rejects the session or the client fails
    async fn update_token(&self, min_validity_secs: u64) -> Result<bool, IdentityClientError>;

    /// Current bearer token, populated after a successful init or refresh
    fn token(&self) -> Option<String>;

    /// Claims of the current token
    fn token_parsed(&self) -> Option<TokenParsed>;

    /// Force a login redirect
    ///
    /// # Errors
    /// Returns error if the redirect cannot be started
    async fn login(&self) -> Result<(), IdentityClientError>;

    /// Redirect to the provider's logout endpoint
    ///
    /// # Errors
    /// Returns error if the redirect cannot be started
    async fn logout(&self) -> Result<(), IdentityClientError>;

    /// Whether the current token carries the realm role
    fn has_realm_role(&self, role: &str) -> bool {
        self.token_parsed()
            .is_some_and(|token| token.has_realm_role(role))
    }

    /// Whether the current token carries the role on `client_id`
    fn has_resource_role(&self, role: &str, client_id: &str) -> bool {
        self.token_parsed()
            .is_some_and(|token| token.has_resource_role(role, client_id))
    }
}

#[async_trait]
impl<T: IdentityClient + ?Sized> IdentityClient for Arc<T> {
    async fn init(&self, options: InitOptions) -> Result<bool, IdentityClientError> {
        (**self).init(options).await
    }

    async fn update_token(&self, min_validity_secs: u64) -> Result<bool, IdentityClientError> {
        (**self).update_token(min_validity_secs).await
    }

    fn token(&self) -> Option<String> {
        (**self).token()
    }

    fn token_parsed(&self) -> Option<TokenParsed> {
        (**self).token_parsed()
    }

    async fn login(&self) -> Result<(), IdentityClientError> {
        (**self).login().await
    }

    async fn logout(&self) -> Result<(), IdentityClientError> {
        (**self).logout().await
    }

    fn has_realm_role(&self, role: &str) -> bool {
        (**self).has_realm_role(role)
    }

    fn has_resource_role(&self, role: &str, client_id: &str) -> bool {
        (**self).has_resource_role(role, client_id)
    }
}

/// Type alias for a shared identity client
pub type SharedIdentityClient = Arc<dyn IdentityClient>;

pub use scripted::{ScriptStep, ScriptedIdentityClient};
