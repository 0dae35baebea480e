use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use super::config::AuthConfig;
use super::cookies;
use super::error::AuthError;
use super::extractor::AuthUser;
use super::state::AuthState;
use super::types::{CurrentUser, LoginResponse};
use crate::login::{LoginExchanger, RetainedExchange, VerifiedProfile};
use crate::oauth::IdentityProvider;
use crate::store::IdentityStore;
use crate::types::Identity;

/// Create the authentication router.
///
/// Routes, relative to the configured auth path (default `/auth`):
/// - `GET /google`: redirect to the provider consent page
/// - `GET /google/callback`: finish login, respond with a session token
/// - `POST /logout`: stateless acknowledgement
/// - `GET /me`: current identity (bearer token required)
/// - `GET /dev-login?email=`: only when dev login is enabled
///
/// The store is shared so the host application can use it too.
pub fn auth_routes<P, S>(config: AuthConfig<P>, store: Arc<S>) -> Router
where
    P: IdentityProvider,
    S: IdentityStore,
{
    let auth_path = config.settings.auth_path.clone();
    let provider_path = format!("{auth_path}/{}", config.settings.provider_segment);

    let state = AuthState {
        exchanger: Arc::new(LoginExchanger::new(config.provider, store)),
        keys: config.keys,
        settings: config.settings,
    };

    let mut router = Router::new()
        .route(&provider_path, get(login::<P, S>))
        .route(&format!("{provider_path}/callback"), get(callback::<P, S>))
        .route(&format!("{auth_path}/logout"), get(logout).post(logout))
        .route(&format!("{auth_path}/me"), get(me::<P, S>));

    if state.settings.dev_login_enabled {
        tracing::warn!("Dev login route enabled");
        router = router.route(&format!("{auth_path}/dev-login"), get(dev_login::<P, S>));
    }

    router.with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<P: IdentityProvider, S: IdentityStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let auth_req = state.exchanger.begin_login();

    let jar = cookies::retain_exchange(
        jar,
        &RetainedExchange::from(&auth_req),
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );

    (jar, Redirect::to(&auth_req.url))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback<P: IdentityProvider, S: IdentityStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> (PrivateCookieJar, Result<Json<LoginResponse>, AuthError>) {
    let retained = cookies::retained_exchange(&jar);
    let jar = cookies::discard_exchange(jar, &state.settings.auth_path);

    let result = complete_callback(&state, params, retained.as_ref()).await;
    (jar, result.map(Json))
}

async fn complete_callback<P: IdentityProvider, S: IdentityStore>(
    state: &AuthState<P, S>,
    params: CallbackParams,
    retained: Option<&RetainedExchange>,
) -> Result<LoginResponse, AuthError> {
    if let Some(error) = params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth2 error from provider");
        return Err(AuthError::ProviderDenied(error));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)?;

    let identity = state
        .exchanger
        .complete_login(&code, params.state.as_deref(), retained)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "OAuth2 login failed"))?;

    let response = login_response(state, identity)?;
    tracing::info!(user_id = %response.user.id, "OAuth2 login successful");
    Ok(response)
}

// ── Logout ─────────────────────────────────────────────────────────

// Tokens are not revocable; clients discard theirs.
async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out successfully" }))
}

// ── Current user ───────────────────────────────────────────────────

async fn me<P: IdentityProvider, S: IdentityStore>(
    State(state): State<AuthState<P, S>>,
    user: AuthUser,
) -> Result<Json<CurrentUser>, AuthError> {
    let identity = state
        .exchanger
        .store()
        .find_by_id(user.user_id)
        .await?
        .ok_or(AuthError::UnknownIdentity)?;

    Ok(Json(CurrentUser {
        user: identity.into(),
    }))
}

// ── Dev Login ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DevLoginParams {
    email: Option<String>,
}

const DEV_EMAIL: &str = "dev@juno.local";

async fn dev_login<P: IdentityProvider, S: IdentityStore>(
    State(state): State<AuthState<P, S>>,
    Query(params): Query<DevLoginParams>,
) -> Result<Json<LoginResponse>, AuthError> {
    // No runtime guard needed: route is only registered when dev login is enabled

    let email = params
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| e.contains('@'))
        .unwrap_or_else(|| DEV_EMAIL.to_string());

    // Existing accounts are reused as-is; their provider id stays untouched.
    let existing = state.exchanger.store().find_by_email(&email).await?;
    let identity = match existing {
        Some(identity) => identity,
        None => {
            let profile = VerifiedProfile::new(format!("dev:{email}"), email);
            state.exchanger.resolve_or_create(&profile).await?
        }
    };

    let response = login_response(&state, identity)?;
    tracing::info!(user_id = %response.user.id, "Dev login successful");
    Ok(Json(response))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_response<P, S>(state: &AuthState<P, S>, identity: Identity) -> Result<LoginResponse, AuthError> {
    let token = state.keys.issue(&identity)?;
    Ok(LoginResponse {
        token,
        user: identity.into(),
    })
}
