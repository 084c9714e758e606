//! Scripted identity client
//!
//! Plays back a fixed sequence of login/refresh outcomes. Each call to
//! [`IdentityClient::init`] or [`IdentityClient::update_token`] consumes the
//! next [`ScriptStep`]. Used by the test suite and the demo; also handy for
//! exercising UI bindings without an identity provider.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{IdentityClient, IdentityClientError, InitOptions};
use crate::types::TokenParsed;

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Authenticate with the given token
    Grant {
        /// Bearer token string
        token: String,
        /// Claims of the token
        token_parsed: TokenParsed,
    },
    /// Resolve with `false`
    Deny,
    /// Fail with an error
    Fail(IdentityClientError),
}

impl ScriptStep {
    /// Grant a token
    pub fn grant(token: impl Into<String>, token_parsed: TokenParsed) -> Self {
        Self::Grant {
            token: token.into(),
            token_parsed,
        }
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    token: Option<String>,
    token_parsed: Option<TokenParsed>,
    last_init: Option<InitOptions>,
    last_min_validity: Option<u64>,
    init_count: usize,
    refresh_count: usize,
    login_count: usize,
    logout_count: usize,
}

/// Identity client that replays [`ScriptStep`]s
///
/// # Example
///
/// ```
/// use keycloak_auth::client::{ScriptStep, ScriptedIdentityClient};
/// use keycloak_auth::types::TokenParsed;
///
/// let client = ScriptedIdentityClient::new([
///     ScriptStep::grant("ABCDEFG", TokenParsed::default()),
///     ScriptStep::Deny,
/// ]);
/// assert_eq!(client.remaining_steps(), 2);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedIdentityClient {
    state: Mutex<ScriptState>,
}

impl ScriptedIdentityClient {
    /// Create a client that plays back `steps` in order
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                steps: steps.into_iter().collect(),
                ..ScriptState::default()
            }),
        }
    }

    /// Append a step to the script
    pub fn push_step(&self, step: ScriptStep) {
        self.lock().steps.push_back(step);
    }

    /// Steps not yet consumed
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        self.lock().steps.len()
    }

    /// Number of `init` calls
    #[must_use]
    pub fn init_count(&self) -> usize {
        self.lock().init_count
    }

    /// Number of `update_token` calls
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.lock().refresh_count
    }

    /// Number of `login` calls
    #[must_use]
    pub fn login_count(&self) -> usize {
        self.lock().login_count
    }

    /// Number of `logout` calls
    #[must_use]
    pub fn logout_count(&self) -> usize {
        self.lock().logout_count
    }

    /// Options of the last `init` call
    #[must_use]
    pub fn last_init(&self) -> Option<InitOptions> {
        self.lock().last_init.clone()
    }

    /// `min_validity_secs` of the last `update_token` call
    #[must_use]
    pub fn last_min_validity(&self) -> Option<u64> {
        self.lock().last_min_validity
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn play_next(&self, operation: &str) -> Result<bool, IdentityClientError> {
        let mut state = self.lock();
        let Some(step) = state.steps.pop_front() else {
            return Err(IdentityClientError::internal(format!(
                "script exhausted on {operation}"
            )));
        };

        match step {
            ScriptStep::Grant {
                token,
                token_parsed,
            } => {
                state.token = Some(token);
                state.token_parsed = Some(token_parsed);
                Ok(true)
            }
            ScriptStep::Deny => {
                state.token = None;
                state.token_parsed = None;
                Ok(false)
            }
            ScriptStep::Fail(error) => {
                state.token = None;
                state.token_parsed = None;
                Err(error)
            }
        }
    }
}

#[async_trait]
impl IdentityClient for ScriptedIdentityClient {
    async fn init(&self, options: InitOptions) -> Result<bool, IdentityClientError> {
        {
            let mut state = self.lock();
            state.init_count += 1;
            state.last_init = Some(options);
        }
        self.play_next("init")
    }

    async fn update_token(&self, min_validity_secs: u64) -> Result<bool, IdentityClientError> {
        {
            let mut state = self.lock();
            state.refresh_count += 1;
            state.last_min_validity = Some(min_validity_secs);
        }
        self.play_next("update_token")
    }

    fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    fn token_parsed(&self) -> Option<TokenParsed> {
        self.lock().token_parsed.clone()
    }

    async fn login(&self) -> Result<(), IdentityClientError> {
        self.lock().login_count += 1;
        Ok(())
    }

    async fn logout(&self) -> Result<(), IdentityClientError> {
        self.lock().logout_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(sub: &str) -> TokenParsed {
        TokenParsed {
            sub: Some(sub.to_string()),
            ..TokenParsed::default()
        }
    }

    #[tokio::test]
    async fn test_plays_steps_in_order() {
        let client = ScriptedIdentityClient::new([
            ScriptStep::grant("first", parsed("a")),
            ScriptStep::Deny,
            ScriptStep::Fail(IdentityClientError::rejected("expired")),
        ]);

        assert!(client.init(InitOptions::login_required()).await.unwrap());
        assert_eq!(client.token().as_deref(), Some("first"));
        assert!(!client.has_realm_role("x"));

        assert!(!client.update_token(70).await.unwrap());
        assert!(client.token().is_none());
        assert_eq!(client.last_min_validity(), Some(70));

        let err = client.update_token(70).await.unwrap_err();
        assert!(err.is_rejected());

        assert_eq!(client.init_count(), 1);
        assert_eq!(client.refresh_count(), 2);
        assert_eq!(client.last_init(), Some(InitOptions::login_required()));
    }

    #[tokio::test]
    async fn test_exhausted_script_is_an_error() {
        let client = ScriptedIdentityClient::default();
        let err = client.init(InitOptions::default()).await.unwrap_err();
        assert!(matches!(err, IdentityClientError::Internal(_)));
    }

    #[tokio::test]
    async fn test_login_and_logout_are_counted() {
        let client = ScriptedIdentityClient::default();
        client.login().await.unwrap();
        client.logout().await.unwrap();
        client.logout().await.unwrap();
        assert_eq!(client.login_count(), 1);
        assert_eq!(client.logout_count(), 2);
    }
}
