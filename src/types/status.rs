//! Authorization state and the status surfaced to UI bindings

use serde::{Deserialize, Serialize};

/// Internal state of the authorization state machine
///
/// ```text
/// PreAuth → Authorizing → RoleCheck → Authorized | Unauthorized | AccessDenied
///                             ↑            │
///                             └── refresh ─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthState {
    /// Created, login not started
    #[default]
    PreAuth,
    /// Waiting for the identity client to finish login
    Authorizing,
    /// Evaluating required roles against a fresh token
    RoleCheck,
    /// Token acquired and roles satisfied
    Authorized,
    /// Login or refresh rejected by the identity client
    Unauthorized,
    /// Token lacks a required role
    AccessDenied,
}

impl AuthState {
    /// Whether this state ends the current login attempt
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Unauthorized | Self::AccessDenied)
    }

    /// Collapse into the four-valued status
    #[must_use]
    pub fn status(self) -> AuthStatus {
        match self {
            Self::PreAuth => AuthStatus::PreAuth,
            Self::Authorizing | Self::RoleCheck => AuthStatus::Authorizing,
            Self::Authorized => AuthStatus::Authorized,
            Self::Unauthorized | Self::AccessDenied => AuthStatus::Unauthorized,
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PreAuth => "pre-auth",
            Self::Authorizing => "authorizing",
            Self::RoleCheck => "role-check",
            Self::Authorized => "authorized",
            Self::Unauthorized => "unauthorized",
            Self::AccessDenied => "access-denied",
        };
        f.write_str(name)
    }
}

/// Status exposed to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStatus {
    /// Nothing attempted yet
    #[default]
    PreAuth,
    /// Login or role check in progress
    Authorizing,
    /// Session is authorized
    Authorized,
    /// Session failed
    Unauthorized,
}

impl AuthStatus {
    /// Still waiting for an outcome
    #[must_use]
    pub fn is_pre_authorization(self) -> bool {
        matches!(self, Self::PreAuth | Self::Authorizing)
    }

    /// An outcome has been reached
    #[must_use]
    pub fn is_post_authorization(self) -> bool {
        matches!(self, Self::Authorized | Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_and_post_authorization() {
        assert!(AuthStatus::PreAuth.is_pre_authorization());
        assert!(AuthStatus::Authorizing.is_pre_authorization());
        assert!(!AuthStatus::Authorized.is_pre_authorization());

        assert!(AuthStatus::Authorized.is_post_authorization());
        assert!(AuthStatus::Unauthorized.is_post_authorization());
        assert!(!AuthStatus::PreAuth.is_post_authorization());
    }

    #[test]
    fn test_state_collapses_to_status() {
        assert_eq!(AuthState::RoleCheck.status(), AuthStatus::Authorizing);
        assert_eq!(AuthState::AccessDenied.status(), AuthStatus::Unauthorized);
        assert!(AuthState::AccessDenied.is_terminal());
        assert!(!AuthState::Authorized.is_terminal());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&AuthStatus::PreAuth).unwrap(),
            "\"pre-auth\""
        );
        assert_eq!(AuthState::RoleCheck.to_string(), "role-check");
    }
}
