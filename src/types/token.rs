//! Decoded token claims

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors decoding a compact JWT payload
#[derive(Debug, Error)]
pub enum TokenDecodeError {
    /// The token does not have three dot-separated segments
    #[error("Malformed token: expected three segments")]
    Malformed,

    /// The payload segment is not base64url
    #[error("Invalid token payload encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload is not a JSON claim set
    #[error("Invalid token claims: {0}")]
    Json(#[from] serde_json::Error),
}

/// Roles granted at realm level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmAccess {
    /// Granted role names
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Roles granted on one client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAccess {
    /// Granted role names
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claim set of an access token
///
/// Only the claims the role policy and the refresh schedule read are typed;
/// everything else is kept in [`TokenParsed::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenParsed {
    /// Expiry, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Issued at, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Realm roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,

    /// Client roles keyed by client id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_access: BTreeMap<String, ResourceAccess>,

    /// Remaining claims
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TokenParsed {
    /// Decode the payload segment of a compact JWT
    ///
    /// The signature is not verified; the identity client owns that.
    ///
    /// # Errors
    ///
    /// Returns [`TokenDecodeError`] if the token is not a three-segment JWT
    /// with a base64url JSON payload.
    pub fn from_jwt(token: &str) -> Result<Self, TokenDecodeError> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenDecodeError::Malformed);
        };

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether the realm role was granted
    #[must_use]
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_roles().iter().any(|r| r == role)
    }

    /// Whether the role was granted on `client_id`
    #[must_use]
    pub fn has_resource_role(&self, role: &str, client_id: &str) -> bool {
        self.client_roles(client_id).iter().any(|r| r == role)
    }

    /// Granted realm roles, empty when the claim is absent
    #[must_use]
    pub fn realm_roles(&self) -> &[String] {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.as_slice())
            .unwrap_or_default()
    }

    /// Granted roles on `client_id`, empty when the claim is absent
    #[must_use]
    pub fn client_roles(&self, client_id: &str) -> &[String] {
        self.resource_access
            .get(client_id)
            .map(|access| access.roles.as_slice())
            .unwrap_or_default()
    }
}
