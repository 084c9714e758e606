//! Authorization state machine
//!
//! One [`Authorization`] drives one login session against an
//! [`IdentityClient`]:
//!
//! ```text
//! PreAuth → Authorizing → RoleCheck → Authorized ──tick──→ RoleCheck → …
//!                │             │
//!                ↓             ↓
//!           Unauthorized   AccessDenied
//! ```
//!
//! - **Login**: `init(login-required)`; success moves to the role check,
//!   rejection emits [`AuthError::Unauthorized`].
//! - **Role check**: [`roles::has_required_roles`] against the fresh token.
//!   Pass persists the token, emits success and (after login) arms the
//!   refresh timer. Fail clears the token, optionally navigates to the
//!   access-denied page and emits [`AuthError::AccessDenied`].
//! - **Refresh tick**: every [`AuthConfig::refresh_period`]; `update_token`
//!   then the role check again. A rejected refresh emits
//!   [`AuthError::RefreshError`] and optionally forces a new login.
//!
//! Any failure ends the session: the timer is not re-armed. Every event is
//! broadcast to the subscriptions registered at emission time, in
//! registration order.
//!
//! # Example
//!
//! ```no_run
//! use keycloak_auth::{AuthConfig, AuthEvent, ScriptStep, ScriptedIdentityClient, authorize};
//! use keycloak_auth::types::TokenParsed;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::builder()
//!     .realm("apps")
//!     .auth_server_url("https://auth.example.com")
//!     .client_id("web")
//!     .build();
//! let client = ScriptedIdentityClient::new([ScriptStep::grant("token", TokenParsed::default())]);
//!
//! let authorization = authorize(config, client)?;
//! let (_subscription, mut events) = authorization.subscribe_channel();
//!
//! if let Some(AuthEvent::Authorized { token, .. }) = events.recv().await {
//!     println!("bearer {token}");
//! }
//!
//! authorization.stop();
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::callbacks::{AuthEvent, AuthHandler, ChannelAuthHandler, FnAuthHandler, SharedAuthHandler};
use crate::client::{IdentityClient, IdentityClientError, InitOptions, SharedIdentityClient};
use crate::error::{AuthError, ConfigError};
use crate::navigation::{Navigator, SharedNavigator, TracingNavigator};
use crate::roles;
use crate::storage::{SharedTokenStore, TokenStore};
use crate::types::{AuthConfig, AuthState, AuthStatus, SubscriptionId, TokenParsed};

/// Start authorizing with `config` against `client`
///
/// Uses no token store and the [`TracingNavigator`]; use
/// [`Authorization::builder`] to supply collaborators.
///
/// # Errors
///
/// Returns [`ConfigError`] if the configuration is invalid.
pub fn authorize(
    config: AuthConfig,
    client: impl IdentityClient + 'static,
) -> Result<Authorization, ConfigError> {
    Authorization::builder(config, client).build()
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Authorization`]
pub struct AuthorizationBuilder {
    config: AuthConfig,
    client: SharedIdentityClient,
    store: Option<SharedTokenStore>,
    navigator: Option<SharedNavigator>,
}

impl AuthorizationBuilder {
    /// Persist the token in `store` under the configured storage key
    #[must_use]
    pub fn store(mut self, store: impl TokenStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Use `navigator` for access-denied redirects
    #[must_use]
    pub fn navigator(mut self, navigator: impl Navigator + 'static) -> Self {
        self.navigator = Some(Arc::new(navigator));
        self
    }

    /// Validate the configuration and create the authorization
    ///
    /// Login starts when the first subscriber joins, or on
    /// [`Authorization::start`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn build(self) -> Result<Authorization, ConfigError> {
        self.config.validate()?;

        if self.config.local_storage_key.is_some() && self.store.is_none() {
            tracing::warn!("Storage key configured without a token store, token will not be persisted");
        }

        let shared = Arc::new(Shared {
            config: Arc::new(self.config),
            client: self.client,
            store: self.store,
            navigator: self
                .navigator
                .unwrap_or_else(|| Arc::new(TracingNavigator) as SharedNavigator),
            cancel: CancellationToken::new(),
            inner: Mutex::new(Inner::default()),
        });

        Ok(Authorization { shared })
    }
}

// ============================================================================
// Refresh Timer
// ============================================================================

/// Owned handle of the repeating refresh task
struct RefreshTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    /// Stop the timer; no further tick runs
    fn cancel(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

// ============================================================================
// Shared State
// ============================================================================

struct SubscriptionEntry {
    id: SubscriptionId,
    handler: SharedAuthHandler,
}

#[derive(Default)]
struct Inner {
    state: AuthState,
    started: bool,
    is_stopped: bool,
    subscriptions: Vec<SubscriptionEntry>,
    token: Option<String>,
    token_parsed: Option<TokenParsed>,
    timer: Option<RefreshTimer>,
}

/// Which step produced the outcome being handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Login,
    Refresh,
}

struct Shared {
    config: Arc<AuthConfig>,
    client: SharedIdentityClient,
    store: Option<SharedTokenStore>,
    navigator: SharedNavigator,
    cancel: CancellationToken,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopped(&self) -> bool {
        self.lock().is_stopped
    }

    fn set_state(&self, state: AuthState) {
        let previous = std::mem::replace(&mut self.lock().state, state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Authorization state transition");
        }
    }

    fn stop(&self) {
        let timer = {
            let mut inner = self.lock();
            if !inner.is_stopped {
                tracing::debug!(
                    subscriptions = inner.subscriptions.len(),
                    "Stopping authorization"
                );
            }
            inner.is_stopped = true;
            inner.subscriptions.clear();
            inner.timer.take()
        };

        if let Some(timer) = timer {
            timer.cancel();
        }
        self.cancel.cancel();
    }

    fn remove_subscription(&self, id: &SubscriptionId) {
        let mut inner = self.lock();
        if let Some(index) = inner.subscriptions.iter().position(|s| &s.id == id) {
            inner.subscriptions.remove(index);
            tracing::debug!(subscription = %id, "Unsubscribed");
        }
    }

    /// Deliver `event` to the subscriptions registered right now
    fn emit(&self, event: &AuthEvent) {
        let handlers: Vec<SharedAuthHandler> = self
            .lock()
            .subscriptions
            .iter()
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            event.dispatch(handler.as_ref());
        }
    }

    fn clear_persisted_token(&self) {
        let (Some(store), Some(key)) = (&self.store, &self.config.local_storage_key) else {
            return;
        };
        if let Err(e) = store.remove(key) {
            tracing::warn!(key = %key, error = %e, "Failed to clear persisted token");
        }
    }

    // ========================================================================
    // Steps
    // ========================================================================

    async fn run_login(self: Arc<Self>) {
        self.set_state(AuthState::Authorizing);
        tracing::info!(
            realm = %self.config.realm,
            client_id = %self.config.client_id,
            "Starting login"
        );

        let outcome = self.client.init(InitOptions::login_required()).await;
        if self.is_stopped() {
            tracing::debug!("Authorization stopped during login, discarding outcome");
            return;
        }

        let authorized = match outcome {
            Ok(true) => self.role_check(Step::Login).await,
            Ok(false) => {
                self.fail(Step::Login, AuthError::Unauthorized).await;
                false
            }
            Err(e) if e.is_rejected() => {
                tracing::debug!(error = %e, "Login rejected");
                self.fail(Step::Login, AuthError::Unauthorized).await;
                false
            }
            Err(e) => {
                self.fail(Step::Login, AuthError::during_authorization(e))
                    .await;
                false
            }
        };

        if authorized {
            self.arm_refresh_timer();
        }
    }

    /// Evaluate roles on the client's current token; `true` when authorized
    async fn role_check(&self, step: Step) -> bool {
        self.set_state(AuthState::RoleCheck);

        let (Some(token), Some(token_parsed)) = (self.client.token(), self.client.token_parsed())
        else {
            let cause =
                IdentityClientError::internal("identity client reported success without a token");
            self.fail(step, AuthError::during_authorization(cause)).await;
            return false;
        };

        let required = self.config.required_roles.as_ref();
        if !roles::has_required_roles(&token_parsed, &self.config.client_id, required) {
            let missing = roles::missing_roles(&token_parsed, &self.config.client_id, required);
            tracing::warn!(
                step = ?step,
                missing = ?missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Token lacks required roles"
            );
            self.fail(step, AuthError::AccessDenied).await;
            return false;
        }

        if let (Some(store), Some(key)) = (&self.store, &self.config.local_storage_key) {
            if let Err(e) = store.set(key, &token) {
                self.fail(step, AuthError::during_authorization(e)).await;
                return false;
            }
        }

        {
            let mut inner = self.lock();
            inner.token = Some(token.clone());
            inner.token_parsed = Some(token_parsed.clone());
        }
        self.set_state(AuthState::Authorized);
        tracing::info!(step = ?step, sub = ?token_parsed.sub, "Authorized");

        self.emit(&AuthEvent::Authorized {
            token,
            token_parsed,
        });
        true
    }

    /// Resolve a failed step: clear the token, apply redirect policy, emit
    async fn fail(&self, step: Step, error: AuthError) {
        self.clear_persisted_token();

        if error.is_access_denied() && self.config.do_access_denied_redirect {
            let url = self.config.access_denied_url();
            tracing::debug!(url = %url, "Redirecting to access denied page");
            self.navigator.navigate(url);
        }

        if error.is_refresh_error() && self.config.do_login_redirect_on_refresh_failed {
            tracing::debug!("Refresh failed, forcing login");
            if let Err(e) = self.client.login().await {
                tracing::warn!(error = %e, "Login redirect failed");
            }
        }

        {
            let mut inner = self.lock();
            inner.token = None;
            inner.token_parsed = None;
        }
        let state = if error.is_access_denied() {
            AuthState::AccessDenied
        } else {
            AuthState::Unauthorized
        };
        self.set_state(state);
        tracing::warn!(step = ?step, kind = %error.kind(), error = %error, "Authorization failed");

        self.emit(&AuthEvent::Failed(error));
    }

    /// One refresh tick; `true` while the session should keep refreshing
    async fn refresh_tick(&self) -> bool {
        let min_validity = self.config.refresh_min_validity_secs();
        tracing::debug!(min_validity_secs = min_validity, "Refreshing token");

        let outcome = self.client.update_token(min_validity).await;
        if self.is_stopped() {
            tracing::debug!("Authorization stopped during refresh, discarding outcome");
            return false;
        }

        match outcome {
            Ok(true) => self.role_check(Step::Refresh).await,
            Ok(false) => {
                self.fail(Step::Refresh, AuthError::RefreshError).await;
                false
            }
            Err(e) if e.is_rejected() => {
                tracing::debug!(error = %e, "Refresh rejected");
                self.fail(Step::Refresh, AuthError::RefreshError).await;
                false
            }
            Err(e) => {
                self.fail(Step::Refresh, AuthError::during_authorization(e))
                    .await;
                false
            }
        }
    }

    fn arm_refresh_timer(self: &Arc<Self>) {
        let period = self.config.refresh_period();
        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(Arc::clone(self).run_refresh_loop(period, cancel.clone()));
        let timer = RefreshTimer { cancel, handle };

        let mut inner = self.lock();
        if inner.is_stopped {
            drop(inner);
            timer.cancel();
            return;
        }
        tracing::debug!(period_secs = period.as_secs(), "Refresh timer armed");
        if let Some(previous) = inner.timer.replace(timer) {
            previous.cancel();
        }
    }

    async fn run_refresh_loop(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Refresh timer cancelled");
                    return;
                }
                _ = interval.tick() => {
                    if !self.refresh_tick().await {
                        break;
                    }
                }
            }
        }

        // Session ended on its own; detach rather than abort our own task
        let _detached = self.lock().timer.take();
    }
}

// ============================================================================
// Authorization
// ============================================================================

/// Handle of one running authorization
///
/// Dropping the handle stops the authorization.
pub struct Authorization {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Authorization")
            .field("realm", &self.shared.config.realm)
            .field("client_id", &self.shared.config.client_id)
            .field("state", &inner.state)
            .field("is_stopped", &inner.is_stopped)
            .field("subscriptions", &inner.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl Authorization {
    /// Create a builder for custom collaborators
    #[must_use]
    pub fn builder(config: AuthConfig, client: impl IdentityClient + 'static) -> AuthorizationBuilder {
        AuthorizationBuilder {
            config,
            client: Arc::new(client),
            store: None,
            navigator: None,
        }
    }

    /// Start the login flow if it has not started yet
    ///
    /// Called implicitly by the first successful subscribe. No-op once
    /// started or stopped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        let should_start = {
            let mut inner = self.shared.lock();
            if inner.started || inner.is_stopped {
                false
            } else {
                inner.started = true;
                true
            }
        };

        if should_start {
            tokio::spawn(Arc::clone(&self.shared).run_login());
        }
    }

    /// Register `handler` for every subsequent outcome
    ///
    /// After [`stop`](Self::stop) the handler immediately receives
    /// [`AuthError::AuthorizationStopped`] and nothing is registered.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe(&self, handler: impl AuthHandler + 'static) -> Subscription {
        self.subscribe_shared(Arc::new(handler))
    }

    /// Register a shared handler
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe_shared(&self, handler: SharedAuthHandler) -> Subscription {
        let id = SubscriptionId::generate();

        let joined = {
            let mut inner = self.shared.lock();
            if inner.is_stopped {
                false
            } else {
                inner.subscriptions.push(SubscriptionEntry {
                    id: id.clone(),
                    handler: Arc::clone(&handler),
                });
                true
            }
        };

        if !joined {
            tracing::debug!(subscription = %id, "Subscribe after stop");
            handler.on_failure(&AuthError::AuthorizationStopped);
            return Subscription { id, shared: None };
        }

        tracing::debug!(subscription = %id, "Subscribed");
        self.start();
        Subscription {
            id,
            shared: Some(Arc::downgrade(&self.shared)),
        }
    }

    /// Register a success/failure closure pair
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe_fn<S, F>(&self, on_success: S, on_failure: F) -> Subscription
    where
        S: Fn(&str, &TokenParsed) + Send + Sync + 'static,
        F: Fn(&AuthError) + Send + Sync + 'static,
    {
        self.subscribe(FnAuthHandler::new(on_success, on_failure))
    }

    /// Register a subscription that forwards outcomes to a channel
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<AuthEvent>) {
        let (handler, rx) = ChannelAuthHandler::new();
        (self.subscribe(handler), rx)
    }

    /// Cancel the refresh timer, drop all subscriptions and refuse new ones
    ///
    /// Idempotent. An in-flight login or refresh is not aborted, but its
    /// outcome is discarded.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Stop the authorization, clear the persisted token and redirect to the
    /// provider's logout
    ///
    /// # Errors
    ///
    /// Returns error if the identity client cannot start the logout.
    pub async fn logout(&self) -> Result<(), IdentityClientError> {
        tracing::info!(realm = %self.shared.config.realm, "Logging out");
        self.shared.stop();
        self.shared.clear_persisted_token();
        self.shared.client.logout().await
    }

    /// Current state machine state
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.shared.lock().state
    }

    /// Four-valued status for UI bindings
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.state().status()
    }

    /// Whether [`stop`](Self::stop) has been called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Whether a refresh timer is armed
    #[must_use]
    pub fn is_refresh_scheduled(&self) -> bool {
        self.shared.lock().timer.is_some()
    }

    /// Token of the last successful outcome, cleared on failure
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.shared.lock().token.clone()
    }

    /// Claims of the last successful outcome, cleared on failure
    #[must_use]
    pub fn token_parsed(&self) -> Option<TokenParsed> {
        self.shared.lock().token_parsed.clone()
    }

    /// Number of registered subscriptions
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.shared.lock().subscriptions.len()
    }

    /// The configuration this authorization runs with
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.shared.config
    }
}

impl Drop for Authorization {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A registered success/failure handler
///
/// A subscription that failed to join (because the authorization was
/// already stopped) is detached: unsubscribing it does nothing.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    shared: Option<Weak<Shared>>,
}

impl Subscription {
    /// Subscription ID
    #[must_use]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Whether this subscription joined the registry
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.shared.is_some()
    }

    /// Remove this subscription; also stop the authorization when
    /// `stop_authorization` is set
    pub fn unsubscribe(&self, stop_authorization: bool) {
        let Some(shared) = self.shared.as_ref().and_then(Weak::upgrade) else {
            return;
        };

        shared.remove_subscription(&self.id);
        if stop_authorization {
            shared.stop();
        }
    }
}
