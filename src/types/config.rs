//! Authorization configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::error::ConfigError;

/// Page shown when a session lacks the required roles
pub const DEFAULT_ACCESS_DENIED_URL: &str = "https://apps-craigmiller160.ddns.net/access-denied/";

/// Access token lifespan assumed when none is configured (Keycloak's default)
pub const DEFAULT_ACCESS_TOKEN_EXPIRATION_SECS: u64 = 300;

/// Seconds before expiry at which the refresh tick fires
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

/// Upper bound for the token lifetime and the refresh margin (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Extra validity requested from the identity client on top of the margin,
/// so the client never considers the current token "fresh enough" on a tick
const MIN_VALIDITY_SLACK_SECS: u64 = 10;

// ============================================================================
// Required Roles
// ============================================================================

/// Client roles a session must hold
///
/// Two shapes are accepted. On the wire a JSON array is [`ClientRoles::Scoped`]
/// and an object is [`ClientRoles::ByClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientRoles {
    /// Roles of the configured client (`AuthConfig::client_id`)
    Scoped(Vec<String>),
    /// Roles keyed by client id
    ByClient(BTreeMap<String, Vec<String>>),
}

impl Default for ClientRoles {
    fn default() -> Self {
        Self::Scoped(Vec::new())
    }
}

impl ClientRoles {
    /// Whether no client role is required
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scoped(roles) => roles.is_empty(),
            Self::ByClient(map) => map.values().all(Vec::is_empty),
        }
    }

    /// Flatten into `(client_id, role)` pairs, resolving scoped roles
    /// against `default_client`
    pub fn iter<'a>(
        &'a self,
        default_client: &'a str,
    ) -> Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a> {
        match self {
            Self::Scoped(roles) => {
                Box::new(roles.iter().map(move |r| (default_client, r.as_str())))
            }
            Self::ByClient(map) => Box::new(map.iter().flat_map(|(client, roles)| {
                roles.iter().map(move |r| (client.as_str(), r.as_str()))
            })),
        }
    }
}

impl From<Vec<String>> for ClientRoles {
    fn from(roles: Vec<String>) -> Self {
        Self::Scoped(roles)
    }
}

impl From<BTreeMap<String, Vec<String>>> for ClientRoles {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self::ByClient(map)
    }
}

/// Roles a decoded token must carry for the session to be authorized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredRoles {
    /// Realm-wide roles
    #[serde(default)]
    pub realm: Vec<String>,
    /// Client-scoped roles
    #[serde(default)]
    pub client: ClientRoles,
}

impl RequiredRoles {
    /// Require the given realm roles
    #[must_use]
    pub fn realm<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            realm: roles.into_iter().map(Into::into).collect(),
            client: ClientRoles::default(),
        }
    }

    /// Require the given roles on the configured client
    #[must_use]
    pub fn client<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            realm: Vec::new(),
            client: ClientRoles::Scoped(roles.into_iter().map(Into::into).collect()),
        }
    }

    /// Add a role on a named client, switching to the keyed shape
    ///
    /// Roles previously added in the scoped shape are kept under `scoped_client`.
    #[must_use]
    pub fn with_client_role(
        mut self,
        scoped_client: &str,
        client_id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        let mut map = match std::mem::take(&mut self.client) {
            ClientRoles::ByClient(map) => map,
            ClientRoles::Scoped(roles) if roles.is_empty() => BTreeMap::new(),
            ClientRoles::Scoped(roles) => BTreeMap::from([(scoped_client.to_string(), roles)]),
        };
        map.entry(client_id.into()).or_default().push(role.into());
        self.client = ClientRoles::ByClient(map);
        self
    }

    /// Whether nothing is required
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.realm.is_empty() && self.client.is_empty()
    }
}

// ============================================================================
// AuthConfig
// ============================================================================

/// Configuration of one authorization instance
///
/// # Example
///
/// ```
/// use keycloak_auth::types::{AuthConfig, RequiredRoles};
///
/// let config = AuthConfig::builder()
///     .realm("apps")
///     .auth_server_url("https://auth.example.com")
///     .client_id("web")
///     .local_storage_key("web-token")
///     .required_roles(RequiredRoles::realm(["access"]))
///     .build();
///
/// assert!(config.validate().is_ok());
/// assert!(config.do_access_denied_redirect);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Identity provider realm
    #[builder(setter(into))]
    pub realm: String,

    /// Base URL of the auth server
    #[builder(setter(into))]
    pub auth_server_url: String,

    /// Registered client id
    #[builder(setter(into))]
    pub client_id: String,

    /// Key under which the bearer token is persisted
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_storage_key: Option<String>,

    /// Roles the token must carry
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_roles: Option<RequiredRoles>,

    /// Navigate to the access-denied page when roles are missing
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub do_access_denied_redirect: bool,

    /// Force a fresh login when a refresh fails
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub do_login_redirect_on_refresh_failed: bool,

    /// Override for [`DEFAULT_ACCESS_DENIED_URL`]
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_denied_url: Option<String>,

    /// Access token lifetime, used to schedule refreshes
    #[builder(default = DEFAULT_ACCESS_TOKEN_EXPIRATION_SECS)]
    #[serde(default = "default_expiration")]
    pub access_token_expiration_secs: u64,

    /// How long before expiry a refresh is attempted
    #[builder(default = DEFAULT_REFRESH_MARGIN_SECS)]
    #[serde(default = "default_margin")]
    pub refresh_margin_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_expiration() -> u64 {
    DEFAULT_ACCESS_TOKEN_EXPIRATION_SECS
}

fn default_margin() -> u64 {
    DEFAULT_REFRESH_MARGIN_SECS
}

impl AuthConfig {
    /// Parse a JSON configuration document (camelCase keys)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, or any error
    /// from [`AuthConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check mandatory fields
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for a blank realm, client id or
    /// server URL, [`ConfigError::ZeroExpiration`] for a zero lifetime and
    /// [`ConfigError::DurationTooLarge`] for a lifetime or margin above
    /// [`MAX_DURATION_SECS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.trim().is_empty() {
            return Err(ConfigError::MissingField("realm"));
        }
        if self.auth_server_url.trim().is_empty() {
            return Err(ConfigError::MissingField("auth_server_url"));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField("client_id"));
        }
        if self.access_token_expiration_secs == 0 {
            return Err(ConfigError::ZeroExpiration);
        }
        for (field, secs) in [
            ("access_token_expiration_secs", self.access_token_expiration_secs),
            ("refresh_margin_secs", self.refresh_margin_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::DurationTooLarge {
                    field,
                    max: MAX_DURATION_SECS,
                });
            }
        }
        Ok(())
    }

    /// URL opened when access is denied
    #[must_use]
    pub fn access_denied_url(&self) -> &str {
        self.access_denied_url
            .as_deref()
            .unwrap_or(DEFAULT_ACCESS_DENIED_URL)
    }

    /// Interval between refresh ticks
    ///
    /// Expiration minus the margin; falls back to half the expiration when
    /// the margin would swallow it, and never goes below one second.
    #[must_use]
    pub fn refresh_period(&self) -> Duration {
        let exp = self.access_token_expiration_secs;
        let secs = if exp > self.refresh_margin_secs {
            exp - self.refresh_margin_secs
        } else {
            exp / 2
        };
        Duration::from_secs(secs.max(1))
    }

    /// Minimum validity passed to the identity client on each refresh
    #[must_use]
    pub fn refresh_min_validity_secs(&self) -> u64 {
        self.refresh_margin_secs
            .saturating_add(MIN_VALIDITY_SLACK_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::builder()
            .realm("realm")
            .auth_server_url("https://auth-server.com")
            .client_id("test-client")
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let config = config();
        assert!(config.do_access_denied_redirect);
        assert!(config.do_login_redirect_on_refresh_failed);
        assert_eq!(config.access_denied_url(), DEFAULT_ACCESS_DENIED_URL);
        assert_eq!(config.access_token_expiration_secs, 300);
        assert_eq!(config.refresh_period(), Duration::from_secs(240));
        assert_eq!(config.refresh_min_validity_secs(), 70);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut config = config();
        config.realm = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::MissingField("realm")));

        let mut config = self::config();
        config.client_id.clear();
        assert_eq!(config.validate(), Err(ConfigError::MissingField("client_id")));

        let mut config = self::config();
        config.access_token_expiration_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroExpiration));
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let mut config = AuthConfig::builder()
            .realm("r")
            .auth_server_url("u")
            .client_id("c")
            .access_token_expiration_secs(u64::MAX)
            .build();
        assert_eq!(
            config.validate(),
            Err(ConfigError::DurationTooLarge {
                field: "access_token_expiration_secs",
                max: MAX_DURATION_SECS,
            })
        );

        config.access_token_expiration_secs = MAX_DURATION_SECS;
        assert_eq!(config.validate(), Ok(()));

        config.refresh_margin_secs = u64::MAX;
        assert_eq!(
            config.validate(),
            Err(ConfigError::DurationTooLarge {
                field: "refresh_margin_secs",
                max: MAX_DURATION_SECS,
            })
        );
        assert_eq!(config.refresh_min_validity_secs(), u64::MAX);
    }

    #[test]
    fn test_refresh_period_short_lifetime() {
        let mut config = config();
        config.access_token_expiration_secs = 30;
        assert_eq!(config.refresh_period(), Duration::from_secs(15));

        config.access_token_expiration_secs = 1;
        assert_eq!(config.refresh_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_json_camel_case() {
        let config = AuthConfig::from_json(
            r#"{
                "realm": "apps",
                "authServerUrl": "https://auth.example.com",
                "clientId": "web",
                "localStorageKey": "token",
                "doAccessDeniedRedirect": false,
                "accessDeniedUrl": "https://example.com/denied",
                "requiredRoles": { "realm": ["access"], "client": { "api": ["read"] } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.local_storage_key.as_deref(), Some("token"));
        assert!(!config.do_access_denied_redirect);
        assert!(config.do_login_redirect_on_refresh_failed);
        assert_eq!(config.access_denied_url(), "https://example.com/denied");
        let roles = config.required_roles.unwrap();
        assert_eq!(roles.realm, vec!["access".to_string()]);
        assert!(matches!(roles.client, ClientRoles::ByClient(_)));
    }

    #[test]
    fn test_client_roles_scoped_shape() {
        let roles: RequiredRoles = serde_json::from_str(r#"{ "client": ["read"] }"#).unwrap();
        assert_eq!(roles.client, ClientRoles::Scoped(vec!["read".to_string()]));
        let pairs: Vec<_> = roles.client.iter("web").collect();
        assert_eq!(pairs, vec![("web", "read")]);
    }

    #[test]
    fn test_from_json_rejects_missing_realm() {
        let err = AuthConfig::from_json(r#"{ "realm": "", "authServerUrl": "u", "clientId": "c" }"#)
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingField("realm"));
    }

    #[test]
    fn test_with_client_role_keeps_scoped_roles() {
        let roles = RequiredRoles::client(["read"]).with_client_role("web", "api", "write");
        let mut pairs: Vec<_> = roles.client.iter("ignored").collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![("api", "write"), ("web", "read")]);
    }
}
