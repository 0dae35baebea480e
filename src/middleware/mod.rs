//! Plug-and-play Google login and bearer-token authentication for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use juno_auth::middleware::{AuthConfig, auth_routes, require_auth};
//! use juno_auth::store::PgIdentityStore;
//!
//! // 1. Configure from environment (fatal on missing secrets)
//! let config = AuthConfig::from_env()?;
//! let keys = config.token_keys().clone();
//!
//! // 2. Mount auth routes over your identity store
//! let store = Arc::new(PgIdentityStore::new(pool));
//! let app = axum::Router::new()
//!     .merge(auth_routes(config, store))
//!     .merge(api.layer(axum::middleware::from_fn_with_state(keys, require_auth)));
//!
//! // 3. Take `AuthUser` in protected handlers
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;
mod types;

pub use config::AuthConfig;
pub use error::AuthError;
pub use extractor::{AuthStatus, AuthUser, authenticate, bearer_token, require_auth};
pub use routes::auth_routes;
pub use types::{CurrentUser, LoginResponse, UserView};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
