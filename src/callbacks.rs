//! Trait-based subscriber callbacks.
//!
//! Every outcome of the authorization state machine (initial login and each
//! refresh tick) is delivered to subscribers through [`AuthHandler`]. Users can
//! implement the trait on their own types, pass a closure pair through
//! [`FnAuthHandler`], or receive [`AuthEvent`]s on a channel.
//!
//! # Example: Implementing `AuthHandler`
//!
//! ```no_run
//! use keycloak_auth::callbacks::AuthHandler;
//! use keycloak_auth::error::AuthError;
//! use keycloak_auth::types::TokenParsed;
//!
//! struct LogHandler;
//!
//! impl AuthHandler for LogHandler {
//!     fn on_success(&self, token: &str, token_parsed: &TokenParsed) {
//!         println!("authorized as {:?} ({} bytes)", token_parsed.sub, token.len());
//!     }
//!
//!     fn on_failure(&self, error: &AuthError) {
//!         eprintln!("authorization failed: {error}");
//!     }
//! }
//! ```
//!
//! Handlers run on the state machine's timeline; they should return quickly.
//! Calling back into the [`Authorization`](crate::Authorization) from a
//! handler (for example to unsubscribe) is allowed.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::AuthError;
use crate::types::TokenParsed;

// ============================================================================
// Auth Events
// ============================================================================

/// One outcome delivered to a subscriber
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// Token acquired (or refreshed) and roles satisfied
    Authorized {
        /// Bearer token
        token: String,
        /// Decoded claims
        token_parsed: TokenParsed,
    },
    /// The step failed
    Failed(AuthError),
}

impl AuthEvent {
    /// Whether this is a success event
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }

    /// The error of a failure event
    #[must_use]
    pub fn error(&self) -> Option<&AuthError> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Authorized { .. } => None,
        }
    }

    /// Deliver this event to `handler`
    pub fn dispatch(&self, handler: &dyn AuthHandler) {
        match self {
            Self::Authorized {
                token,
                token_parsed,
            } => handler.on_success(token, token_parsed),
            Self::Failed(error) => handler.on_failure(error),
        }
    }
}

// ============================================================================
// Auth Handler Trait
// ============================================================================

/// Success/failure callback pair of a subscription
pub trait AuthHandler: Send + Sync {
    /// Called with the token after a successful login or refresh
    fn on_success(&self, token: &str, token_parsed: &TokenParsed);

    /// Called when a step ends in an error
    fn on_failure(&self, error: &AuthError);
}

// Blanket implementation for boxed trait objects
impl AuthHandler for Box<dyn AuthHandler> {
    fn on_success(&self, token: &str, token_parsed: &TokenParsed) {
        (**self).on_success(token, token_parsed);
    }

    fn on_failure(&self, error: &AuthError) {
        (**self).on_failure(error);
    }
}

impl<T: AuthHandler + ?Sized> AuthHandler for Arc<T> {
    fn on_success(&self, token: &str, token_parsed: &TokenParsed) {
        (**self).on_success(token, token_parsed);
    }

    fn on_failure(&self, error: &AuthError) {
        (**self).on_failure(error);
    }
}

/// Type alias for a shared auth handler.
pub type SharedAuthHandler = Arc<dyn AuthHandler>;

// ============================================================================
// Closure-based handler
// ============================================================================

/// Wrapper to convert a pair of closures into an [`AuthHandler`].
///
/// # Example
///
/// ```no_run
/// use keycloak_auth::callbacks::{AuthHandler, FnAuthHandler};
/// use std::sync::Arc;
///
/// let handler = FnAuthHandler::new(
///     |token, _parsed| println!("token: {token}"),
///     |error| eprintln!("failed: {error}"),
/// );
///
/// let shared: Arc<dyn AuthHandler> = Arc::new(handler);
/// ```
pub struct FnAuthHandler<S, F>
where
    S: Fn(&str, &TokenParsed) + Send + Sync,
    F: Fn(&AuthError) + Send + Sync,
{
    on_success: S,
    on_failure: F,
}

impl<S, F> FnAuthHandler<S, F>
where
    S: Fn(&str, &TokenParsed) + Send + Sync,
    F: Fn(&AuthError) + Send + Sync,
{
    /// Create a new function-based handler.
    pub fn new(on_success: S, on_failure: F) -> Self {
        Self {
            on_success,
            on_failure,
        }
    }
}

impl<S, F> AuthHandler for FnAuthHandler<S, F>
where
    S: Fn(&str, &TokenParsed) + Send + Sync,
    F: Fn(&AuthError) + Send + Sync,
{
    fn on_success(&self, token: &str, token_parsed: &TokenParsed) {
        (self.on_success)(token, token_parsed);
    }

    fn on_failure(&self, error: &AuthError) {
        (self.on_failure)(error);
    }
}

// ============================================================================
// Channel-based handler
// ============================================================================

/// Handler forwarding every outcome to an unbounded channel
///
/// Events are sent in emission order. Once the receiver is dropped further
/// events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelAuthHandler {
    tx: mpsc::UnboundedSender<AuthEvent>,
}

impl ChannelAuthHandler {
    /// Create a handler and the receiving end of its channel
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuthEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: AuthEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Auth event receiver dropped, discarding event");
        }
    }
}

impl AuthHandler for ChannelAuthHandler {
    fn on_success(&self, token: &str, token_parsed: &TokenParsed) {
        self.send(AuthEvent::Authorized {
            token: token.to_string(),
            token_parsed: token_parsed.clone(),
        });
    }

    fn on_failure(&self, error: &AuthError) {
        self.send(AuthEvent::Failed(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl AuthHandler for Recorder {
        fn on_success(&self, token: &str, _token_parsed: &TokenParsed) {
            self.events.lock().unwrap().push(format!("ok:{token}"));
        }

        fn on_failure(&self, error: &AuthError) {
            self.events.lock().unwrap().push(format!("err:{}", error.kind()));
        }
    }

    #[test]
    fn test_dispatch_routes_by_variant() {
        let recorder = Recorder::default();
        AuthEvent::Authorized {
            token: "ABCDEFG".to_string(),
            token_parsed: TokenParsed::default(),
        }
        .dispatch(&recorder);
        AuthEvent::Failed(AuthError::AccessDenied).dispatch(&recorder);

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["ok:ABCDEFG".to_string(), "err:access-denied".to_string()]
        );
    }

    #[test]
    fn test_fn_handler_through_arc() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ok = Arc::clone(&seen);
        let err = Arc::clone(&seen);
        let handler: SharedAuthHandler = Arc::new(FnAuthHandler::new(
            move |token: &str, _parsed: &TokenParsed| ok.lock().unwrap().push(token.to_string()),
            move |error: &AuthError| err.lock().unwrap().push(error.to_string()),
        ));

        handler.on_success("t", &TokenParsed::default());
        handler.on_failure(&AuthError::Unauthorized);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["t".to_string(), "User is unauthorized".to_string()]
        );
    }

    #[tokio::test]
    async fn test_channel_handler_preserves_order() {
        let (handler, mut rx) = ChannelAuthHandler::new();
        handler.on_success("a", &TokenParsed::default());
        handler.on_failure(&AuthError::RefreshError);

        assert!(rx.recv().await.unwrap().is_authorized());
        let event = rx.recv().await.unwrap();
        assert!(event.error().unwrap().is_refresh_error());
    }

    #[test]
    fn test_channel_handler_tolerates_dropped_receiver() {
        let (handler, rx) = ChannelAuthHandler::new();
        drop(rx);
        handler.on_failure(&AuthError::Unauthorized);
    }
}
