//! juno-auth server binary
//!
//! Serves the auth routes over the Postgres identity store, plus a health
//! check and a small protected `/api/whoami` endpoint. Configured entirely
//! from the environment.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Extension, Json, Router};
use juno_auth::IdentityStore;
use juno_auth::middleware::{AuthConfig, AuthUser, auth_routes, require_auth};
use juno_auth::store::PgIdentityStore;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "juno-auth",
    }))
}

// `require_auth` attaches the caller; no token keys needed in router state.
async fn whoami(Extension(user): Extension<AuthUser>) -> String {
    format!("{} <{}>", user.user_id, user.email)
}

fn app<S: IdentityStore>(config: AuthConfig, store: Arc<S>) -> Router {
    let api = Router::new()
        .route("/api/whoami", get(whoami))
        .layer(from_fn_with_state(config.token_keys().clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .merge(auth_routes(config, store))
        .merge(api)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = AuthConfig::from_env().context("loading auth configuration")?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("connecting to Postgres")?;

    let store = PgIdentityStore::new(pool);
    store.migrate().await.context("running migrations")?;

    let app = app(config, Arc::new(store));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "juno-auth listening");

    axum::serve(listener, app).await?;
    Ok(())
}
