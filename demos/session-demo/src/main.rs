//! Scripted session demo
//!
//! Runs one authorization against a scripted identity client: login, a few
//! refresh ticks, and optionally a final refresh whose token has lost the
//! required role.
//!
//! Run with:
//!   RUST_LOG=keycloak_auth=debug cargo run -p session-demo -- --refreshes 3 --revoke

use anyhow::{Context, Result};
use clap::Parser;
use keycloak_auth::types::{RealmAccess, TokenParsed};
use keycloak_auth::{
    AuthConfig, AuthEvent, Authorization, MemoryTokenStore, RequiredRoles, ScriptStep,
    ScriptedIdentityClient, TokenStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const REQUIRED_ROLE: &str = "access";
const STORAGE_KEY: &str = "session-demo";

/// Scripted Keycloak session
#[derive(Parser, Debug)]
#[command(name = "session-demo")]
#[command(about = "Login, role check and token refresh against a scripted identity client")]
struct Args {
    /// JSON config file (camelCase keys); a built-in config is used otherwise
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Number of successful refresh ticks after login
    #[arg(long, short = 'r', default_value = "2")]
    refreshes: usize,

    /// End with a refresh whose token lacks the required role
    #[arg(long)]
    revoke: bool,

    /// Access token lifespan in seconds (built-in config only)
    #[arg(long, default_value = "3")]
    expiration: u64,
}

fn claims(sub: &str, roles: &[&str]) -> TokenParsed {
    TokenParsed {
        sub: Some(sub.to_string()),
        realm_access: Some(RealmAccess {
            roles: roles.iter().map(ToString::to_string).collect(),
        }),
        ..TokenParsed::default()
    }
}

fn load_config(args: &Args) -> Result<AuthConfig> {
    if let Some(path) = &args.config {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        return Ok(AuthConfig::from_json(&json)?);
    }

    Ok(AuthConfig::builder()
        .realm("apps-dev")
        .auth_server_url("https://auth.example.com")
        .client_id("session-demo")
        .local_storage_key(STORAGE_KEY)
        .required_roles(RequiredRoles::realm([REQUIRED_ROLE]))
        .access_token_expiration_secs(args.expiration)
        .refresh_margin_secs(1)
        .build())
}

fn script(args: &Args) -> Vec<ScriptStep> {
    let mut steps = vec![ScriptStep::grant("demo-token-0", claims("demo-user", &[REQUIRED_ROLE]))];
    for n in 1..=args.refreshes {
        steps.push(ScriptStep::grant(
            format!("demo-token-{n}"),
            claims("demo-user", &[REQUIRED_ROLE]),
        ));
    }
    if args.revoke {
        steps.push(ScriptStep::grant("demo-token-revoked", claims("demo-user", &[])));
    }
    steps
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let storage_key = config.local_storage_key.clone();

    let store = Arc::new(MemoryTokenStore::new());
    let client = ScriptedIdentityClient::new(script(&args));
    let authorization = Authorization::builder(config, client)
        .store(Arc::clone(&store))
        .build()?;

    tracing::info!(
        client_id = %authorization.config().client_id,
        realm = %authorization.config().realm,
        refresh_secs = authorization.config().refresh_period().as_secs(),
        "Authorizing"
    );

    let (subscription, mut events) = authorization.subscribe_channel();
    let expected = 1 + args.refreshes + usize::from(args.revoke);

    for _ in 0..expected {
        let Some(event) = events.recv().await else {
            break;
        };
        match event {
            AuthEvent::Authorized {
                token,
                token_parsed,
            } => {
                println!("✓ {token} [{}]", authorization.state());
                println!("{}", serde_json::to_string_pretty(&token_parsed)?);
            }
            AuthEvent::Failed(error) => {
                println!("✗ {} ({error})", error.kind());
                break;
            }
        }
    }

    if let Some(key) = storage_key {
        let persisted = store.get(&key)?;
        tracing::info!(key = %key, persisted = persisted.is_some(), "Token store checked");
    }

    subscription.unsubscribe(true);
    tracing::info!(stopped = authorization.is_stopped(), "Session ended");
    Ok(())
}
