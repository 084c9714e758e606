//! Error types for keycloak-auth
//!
//! Every terminal outcome of a state machine step is resolved into one
//! [`AuthError`] variant before it reaches a subscriber, so callers can
//! pattern-match without knowing the identity client's error shape.

use std::sync::Arc;
use thiserror::Error;

/// Terminal outcome of an authorization step, delivered to failure handlers
///
/// `Clone` because a single outcome is broadcast to every subscriber.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// The identity client could not authenticate the user
    #[error("User is unauthorized")]
    Unauthorized,

    /// Login or refresh succeeded but the token lacks a required role
    #[error("User does not have access to application")]
    AccessDenied,

    /// A subscription was attempted after the authorization was stopped
    #[error("Authorization has been stopped, valid token no longer available")]
    AuthorizationStopped,

    /// An unexpected failure surfaced while running a step
    #[error("An error occurred during authorization: {source}")]
    ErrorDuringAuthorization {
        /// Underlying cause
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A refresh tick failed to obtain a new token
    #[error("Failed to refresh token")]
    RefreshError,
}

/// Flat classification of [`AuthError`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// See [`AuthError::Unauthorized`]
    Unauthorized,
    /// See [`AuthError::AccessDenied`]
    AccessDenied,
    /// See [`AuthError::AuthorizationStopped`]
    AuthorizationStopped,
    /// See [`AuthError::ErrorDuringAuthorization`]
    ErrorDuringAuthorization,
    /// See [`AuthError::RefreshError`]
    RefreshError,
}

impl AuthErrorKind {
    /// Stable kebab-case name of the kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::AccessDenied => "access-denied",
            Self::AuthorizationStopped => "authorization-stopped",
            Self::ErrorDuringAuthorization => "error-during-authorization",
            Self::RefreshError => "refresh-error",
        }
    }
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::Unauthorized => AuthErrorKind::Unauthorized,
            Self::AccessDenied => AuthErrorKind::AccessDenied,
            Self::AuthorizationStopped => AuthErrorKind::AuthorizationStopped,
            Self::ErrorDuringAuthorization { .. } => AuthErrorKind::ErrorDuringAuthorization,
            Self::RefreshError => AuthErrorKind::RefreshError,
        }
    }

    /// Wrap an unexpected failure
    pub fn during_authorization(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ErrorDuringAuthorization {
            source: Arc::new(cause),
        }
    }

    /// Whether this error is [`AuthError::AccessDenied`]
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied)
    }

    /// Whether this error is [`AuthError::RefreshError`]
    #[must_use]
    pub fn is_refresh_error(&self) -> bool {
        matches!(self, Self::RefreshError)
    }
}

/// Invalid [`AuthConfig`](crate::types::AuthConfig)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A mandatory field is empty or blank
    #[error("Invalid configuration: `{0}` must not be empty")]
    MissingField(&'static str),

    /// The access token lifetime is zero
    #[error("Invalid configuration: access token expiration must be greater than zero")]
    ZeroExpiration,

    /// A duration setting exceeds the supported maximum
    #[error("Invalid configuration: `{field}` must be at most {max} seconds")]
    DurationTooLarge {
        /// Offending field
        field: &'static str,
        /// Largest accepted value in seconds
        max: u64,
    },

    /// The configuration document could not be parsed
    #[error("Invalid configuration: {0}")]
    Parse(String),
}

/// Result type alias for keycloak-auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(AuthError::Unauthorized.kind().as_str(), "unauthorized");
        assert_eq!(AuthError::AccessDenied.kind().as_str(), "access-denied");
        assert_eq!(
            AuthError::AuthorizationStopped.kind().to_string(),
            "authorization-stopped"
        );
        assert_eq!(AuthError::RefreshError.kind().as_str(), "refresh-error");
    }

    #[test]
    fn test_during_authorization_keeps_cause() {
        let io = std::io::Error::other("disk full");
        let err = AuthError::during_authorization(io);

        assert_eq!(err.kind(), AuthErrorKind::ErrorDuringAuthorization);
        assert!(err.to_string().contains("disk full"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_clone_preserves_kind() {
        let err = AuthError::during_authorization(std::io::Error::other("boom"));
        let cloned = err.clone();
        assert_eq!(err.kind(), cloned.kind());
    }
}
