//! Required-role policy
//!
//! Decides whether a decoded token satisfies the configured
//! [`RequiredRoles`]. Pure functions over their inputs, evaluated after
//! every login and every refresh, since a refreshed token may drop a role
//! that was present before.
//!
//! # Example
//!
//! ```
//! use keycloak_auth::roles::has_required_roles;
//! use keycloak_auth::types::{RequiredRoles, TokenParsed};
//!
//! let token: TokenParsed = serde_json::from_str(
//!     r#"{ "realm_access": { "roles": ["access"] } }"#,
//! ).unwrap();
//!
//! assert!(has_required_roles(&token, "web", Some(&RequiredRoles::realm(["access"]))));
//! assert!(!has_required_roles(&token, "web", Some(&RequiredRoles::realm(["admin"]))));
//! assert!(has_required_roles(&token, "web", None));
//! ```

use crate::types::{RequiredRoles, TokenParsed};

/// A required role the token does not carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingRole {
    /// Realm role
    Realm(String),
    /// Role on a client
    Client {
        /// Client id the role belongs to
        client_id: String,
        /// Role name
        role: String,
    },
}

impl std::fmt::Display for MissingRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Realm(role) => write!(f, "realm:{role}"),
            Self::Client { client_id, role } => write!(f, "{client_id}:{role}"),
        }
    }
}

/// Every required role absent from `token`, realm roles first
///
/// Scoped client roles are looked up on `client_id`.
#[must_use]
pub fn missing_roles(
    token: &TokenParsed,
    client_id: &str,
    required: Option<&RequiredRoles>,
) -> Vec<MissingRole> {
    let Some(required) = required else {
        return Vec::new();
    };

    let realm = required
        .realm
        .iter()
        .filter(|role| !token.has_realm_role(role))
        .map(|role| MissingRole::Realm(role.clone()));

    let client = required
        .client
        .iter(client_id)
        .filter(|(client, role)| !token.has_resource_role(role, client))
        .map(|(client, role)| MissingRole::Client {
            client_id: client.to_string(),
            role: role.to_string(),
        });

    realm.chain(client).collect()
}

/// Whether `token` carries every required realm and client role
///
/// Absent or empty requirements always pass.
#[must_use]
pub fn has_required_roles(
    token: &TokenParsed,
    client_id: &str,
    required: Option<&RequiredRoles>,
) -> bool {
    let Some(required) = required else {
        return true;
    };

    let realm_ok = required.realm.iter().all(|role| token.has_realm_role(role));
    let client_ok = required
        .client
        .iter(client_id)
        .all(|(client, role)| token.has_resource_role(role, client));

    realm_ok && client_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientRoles;
    use std::collections::BTreeMap;

    const CLIENT_ID: &str = "test-client";

    fn token(realm: &[&str], client: &[&str]) -> TokenParsed {
        serde_json::from_value(serde_json::json!({
            "sub": "mock-token",
            "realm_access": { "roles": realm },
            "resource_access": { CLIENT_ID: { "roles": client } }
        }))
        .unwrap()
    }

    #[test]
    fn test_no_requirements_pass() {
        let token = TokenParsed::default();
        assert!(has_required_roles(&token, CLIENT_ID, None));
        assert!(has_required_roles(
            &token,
            CLIENT_ID,
            Some(&RequiredRoles::default())
        ));
    }

    #[test]
    fn test_every_subset_of_granted_roles_passes() {
        let granted = ["a", "b", "c"];
        let token = token(&granted, &[]);

        for mask in 0u8..8 {
            let subset: Vec<&str> = granted
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, r)| *r)
                .collect();
            let required = RequiredRoles::realm(subset.clone());
            assert!(
                has_required_roles(&token, CLIENT_ID, Some(&required)),
                "subset {subset:?} should pass"
            );
        }
    }

    #[test]
    fn test_any_missing_realm_role_fails() {
        let token = token(&["a", "b"], &[]);
        let required = RequiredRoles::realm(["a", "x"]);

        assert!(!has_required_roles(&token, CLIENT_ID, Some(&required)));
        assert_eq!(
            missing_roles(&token, CLIENT_ID, Some(&required)),
            vec![MissingRole::Realm("x".to_string())]
        );
    }

    #[test]
    fn test_absent_realm_access_is_zero_roles() {
        let token: TokenParsed = serde_json::from_str(r#"{ "sub": "t" }"#).unwrap();
        assert!(!has_required_roles(
            &token,
            CLIENT_ID,
            Some(&RequiredRoles::realm(["a"]))
        ));
    }

    #[test]
    fn test_scoped_client_roles() {
        let token = token(&[], &["client-access"]);

        assert!(has_required_roles(
            &token,
            CLIENT_ID,
            Some(&RequiredRoles::client(["client-access"]))
        ));
        assert!(!has_required_roles(
            &token,
            CLIENT_ID,
            Some(&RequiredRoles::client(["client-admin"]))
        ));
        // Scoped roles resolve against the configured client only
        assert!(!has_required_roles(
            &token,
            "other-client",
            Some(&RequiredRoles::client(["client-access"]))
        ));
    }

    #[test]
    fn test_client_roles_by_client() {
        let token = token(&[], &["client-access"]);
        let required = RequiredRoles {
            realm: Vec::new(),
            client: ClientRoles::ByClient(BTreeMap::from([
                (CLIENT_ID.to_string(), vec!["client-access".to_string()]),
                ("api".to_string(), vec!["read".to_string()]),
            ])),
        };

        assert!(!has_required_roles(&token, CLIENT_ID, Some(&required)));
        let missing = missing_roles(&token, CLIENT_ID, Some(&required));
        assert_eq!(
            missing,
            vec![MissingRole::Client {
                client_id: "api".to_string(),
                role: "read".to_string(),
            }]
        );
        assert_eq!(missing[0].to_string(), "api:read");
    }

    #[test]
    fn test_realm_and_client_both_required() {
        let token = token(&["realm-access"], &["client-access"]);
        let required = RequiredRoles {
            realm: vec!["realm-access".to_string()],
            client: ClientRoles::Scoped(vec!["client-access".to_string()]),
        };
        assert!(has_required_roles(&token, CLIENT_ID, Some(&required)));
        assert!(missing_roles(&token, CLIENT_ID, Some(&required)).is_empty());
    }
}
