//! # Keycloak Auth for Rust
//!
//! Session helper for applications authenticating against a Keycloak
//! identity provider. Logs in once, checks the token's realm and client
//! roles, refreshes the token on a fixed period and broadcasts every
//! outcome to subscribers. Async/await, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use keycloak_auth::{AuthConfig, RequiredRoles, ScriptStep, ScriptedIdentityClient, authorize};
//! use keycloak_auth::types::TokenParsed;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::builder()
//!         .realm("apps-prod")
//!         .auth_server_url("https://auth.example.com")
//!         .client_id("expense-tracker")
//!         .required_roles(RequiredRoles::realm(["access"]))
//!         .build();
//!
//!     let client = ScriptedIdentityClient::new([ScriptStep::grant("token", TokenParsed::default())]);
//!     let authorization = authorize(config, client)?;
//!
//!     let _subscription = authorization.subscribe_fn(
//!         |token, parsed| println!("authorized {:?} ({} bytes)", parsed.sub, token.len()),
//!         |error| eprintln!("failed: {error}"),
//!     );
//!
//!     // ... later
//!     authorization.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Authorization lifecycle with [`Authorization`]
//!
//! [`authorize()`] returns a handle whose login starts with the first
//! subscriber. Every subscriber receives exactly one event per login or
//! refresh outcome. [`Authorization::stop`] (or dropping the handle) cancels
//! the refresh timer; subscribing afterwards yields
//! [`AuthError::AuthorizationStopped`] immediately.
//!
//! ### 2. Role policy with [`roles`]
//!
//! Required realm roles and client roles (scoped to the configured client or
//! keyed by client ID) must all be present in the token.
//!
//! ### 3. Pluggable collaborators
//!
//! - [`IdentityClient`] - the identity provider adapter
//! - [`TokenStore`] - persistence of the bearer token
//! - [`Navigator`] - the access-denied redirect
//!
//! ```no_run
//! # use keycloak_auth::{AuthConfig, Authorization, FileTokenStore, ScriptedIdentityClient};
//! # use keycloak_auth::navigation::FnNavigator;
//! # fn example(config: AuthConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let authorization = Authorization::builder(config, ScriptedIdentityClient::default())
//!     .store(FileTokenStore::new())
//!     .navigator(FnNavigator::new(|url: &str| println!("open {url}")))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! To see logs, attach a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! Tokens are never logged; only the subject claim and role names are.
//!
//! ## Demo
//!
//! ```bash
//! RUST_LOG=keycloak_auth=debug cargo run -p session-demo
//! ```
//!
//! ## Error Handling
//!
//! Subscribers receive [`AuthError`]; match on [`AuthError::kind`] for a
//! stable name:
//!
//! ```no_run
//! # use keycloak_auth::{AuthError, AuthErrorKind};
//! fn on_failure(error: &AuthError) {
//!     match error.kind() {
//!         AuthErrorKind::AccessDenied => eprintln!("missing roles"),
//!         AuthErrorKind::RefreshError => eprintln!("session expired"),
//!         kind => eprintln!("{kind}: {error}"),
//!     }
//! }
//! ```
//!
//! Invalid configuration is reported up front as a [`ConfigError`].
//!
//! ## Requirements
//!
//! - Rust 1.85.0 or later
//! - A Tokio runtime

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authorization;
pub mod callbacks;
pub mod client;
pub mod error;
pub mod navigation;
pub mod roles;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use authorization::{Authorization, AuthorizationBuilder, Subscription, authorize};
pub use callbacks::{AuthEvent, AuthHandler, ChannelAuthHandler, FnAuthHandler, SharedAuthHandler};
pub use client::{
    IdentityClient, IdentityClientError, InitOptions, OnLoad, ScriptStep,
    ScriptedIdentityClient,
};
pub use error::{AuthError, AuthErrorKind, ConfigError, Result};
pub use navigation::{Navigator, RecordingNavigator, TracingNavigator};
pub use roles::{MissingRole, has_required_roles, missing_roles};
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};
pub use types::{
    AuthConfig, AuthState, AuthStatus, ClientRoles, RequiredRoles, SubscriptionId, TokenParsed,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
