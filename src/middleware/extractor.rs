use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use time::OffsetDateTime;

use super::error::AuthError;
use crate::token::{SessionClaims, TokenError, TokenKeys};
use crate::types::UserId;

/// Authenticated caller, taken from a verified session token.
///
/// Use as an Axum extractor in route handlers. Returns `401 Unauthorized`
/// with a JSON error body if the bearer token is absent or invalid. Works
/// with any router state that exposes [`TokenKeys`] via `FromRef`, and
/// reuses the identity attached by [`require_auth`] when present.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(user: AuthUser) -> impl IntoResponse {
///     format!("Hello, user {} ({})", user.user_id, user.email)
/// }
///
/// // Optional: accessible to both authenticated and anonymous callers
/// async fn public(user: Option<AuthUser>) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}", u.email),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub email: String,
}

impl From<SessionClaims> for AuthUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id(),
            email: claims.email,
        }
    }
}

/// Per-request authentication progress.
///
/// `Unauthenticated -> CredentialPresented -> Authenticated | Rejected`.
/// Only `Authenticated` carries an identity downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    CredentialPresented(String),
    Authenticated(AuthUser),
    Rejected(TokenError),
}

impl AuthStatus {
    /// Look for a bearer credential in `headers`.
    #[must_use]
    pub fn present(self, headers: &HeaderMap) -> Self {
        match self {
            Self::Unauthenticated => match bearer_token(headers) {
                Ok(token) => Self::CredentialPresented(token.to_string()),
                Err(e) => Self::Rejected(e),
            },
            other => other,
        }
    }

    /// Verify a presented credential at `now`.
    #[must_use]
    pub fn verify(self, keys: &TokenKeys, now: OffsetDateTime) -> Self {
        match self {
            Self::CredentialPresented(raw) => match keys.verify_at(&raw, now) {
                Ok(claims) => Self::Authenticated(claims.into()),
                Err(e) => Self::Rejected(e),
            },
            Self::Unauthenticated => Self::Rejected(TokenError::MissingCredential),
            terminal => terminal,
        }
    }

    /// The identity, if authentication finished successfully.
    ///
    /// # Errors
    ///
    /// The rejection reason; an unverified credential counts as invalid.
    pub fn into_result(self) -> Result<AuthUser, TokenError> {
        match self {
            Self::Authenticated(user) => Ok(user),
            Self::Rejected(e) => Err(e),
            Self::Unauthenticated => Err(TokenError::MissingCredential),
            Self::CredentialPresented(_) => Err(TokenError::InvalidSignature),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
///
/// # Errors
///
/// [`TokenError::MissingCredential`] if the header is absent, not `Bearer`,
/// or carries no token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(TokenError::MissingCredential)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(TokenError::MissingCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::MissingCredential);
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(TokenError::MissingCredential);
    }
    Ok(token)
}

/// Run the request state machine to completion.
///
/// # Errors
///
/// The [`TokenError`] the request was rejected with.
pub fn authenticate(
    keys: &TokenKeys,
    headers: &HeaderMap,
    now: OffsetDateTime,
) -> Result<AuthUser, TokenError> {
    AuthStatus::Unauthenticated
        .present(headers)
        .verify(keys, now)
        .into_result()
}

impl<S> FromRequestParts<S> for AuthUser
where
    TokenKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        let keys = TokenKeys::from_ref(state);
        Ok(authenticate(&keys, &parts.headers, OffsetDateTime::now_utc())?)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    TokenKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    /// `None` without a credential; a bad credential is still rejected.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) && parts.extensions.get::<AuthUser>().is_none() {
            return Ok(None);
        }
        <Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

/// Middleware that rejects unauthenticated requests and attaches
/// [`AuthUser`] to the request extensions.
///
/// ```rust,ignore
/// let api = Router::new()
///     .route("/rides", post(create_ride))
///     .layer(axum::middleware::from_fn_with_state(keys, require_auth));
/// ```
///
/// # Errors
///
/// [`AuthError::Token`] (401) before the inner handler runs.
pub async fn require_auth(
    State(keys): State<TokenKeys>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate(&keys, request.headers(), OffsetDateTime::now_utc())?;
    tracing::debug!(user_id = %user.user_id, "Request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
