use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::login::LoginError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Authentication errors for the HTTP layer.
///
/// Every variant renders as `{"error": "<message>"}`. Internal failures are
/// logged and reported with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Callback arrived without an authorization code.
    #[error("Authorization code not found")]
    MissingCode,

    /// The provider reported an error instead of a code (e.g. user cancelled).
    #[error("Login was denied by the provider: {0}")]
    ProviderDenied(String),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// A valid token names a user that no longer exists.
    #[error("User not found")]
    UnknownIdentity,

    #[error("Identity store error: {0}")]
    Store(#[from] StoreError),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCode | Self::Login(LoginError::IncompleteProfile(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::ProviderDenied(_) | Self::Login(LoginError::InvalidState) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Token(TokenError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::UnknownIdentity => StatusCode::NOT_FOUND,
            Self::Login(_) | Self::Store(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::ProviderDenied(_) => "Login was denied by the provider".into(),
            Self::Login(LoginError::InvalidState) => "Invalid state parameter".into(),
            Self::Login(LoginError::IncompleteProfile(_)) => "Missing required user information".into(),
            Self::Login(LoginError::TokenExchangeFailed(_)) => "Failed to exchange code for token".into(),
            Self::Login(LoginError::ProfileFetchFailed(_)) => "Failed to get user info".into(),
            Self::Login(LoginError::Storage(_)) => "Failed to create or update user".into(),
            Self::Token(TokenError::Signing(_)) => "Failed to generate token".into(),
            Self::Store(_) | Self::Config(_) => "Internal error".into(),
            Self::MissingCode | Self::Token(_) | Self::UnknownIdentity => self.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Auth internal error");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Auth request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn oauth_failure() -> Error {
        Error::OAuth {
            operation: "token exchange",
            status: Some(400),
            detail: "invalid_grant".into(),
        }
    }

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (AuthError::MissingCode, StatusCode::BAD_REQUEST),
            (LoginError::IncompleteProfile("email").into(), StatusCode::BAD_REQUEST),
            (AuthError::ProviderDenied("access_denied".into()), StatusCode::UNAUTHORIZED),
            (LoginError::InvalidState.into(), StatusCode::UNAUTHORIZED),
            (TokenError::MissingCredential.into(), StatusCode::UNAUTHORIZED),
            (TokenError::InvalidSignature.into(), StatusCode::UNAUTHORIZED),
            (TokenError::Expired.into(), StatusCode::UNAUTHORIZED),
            (TokenError::Signing("empty".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
            (
                LoginError::TokenExchangeFailed(oauth_failure()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LoginError::ProfileFetchFailed(oauth_failure()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AuthError::UnknownIdentity, StatusCode::NOT_FOUND),
            (AuthError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err: AuthError = LoginError::TokenExchangeFailed(oauth_failure()).into();
        assert_eq!(err.public_message(), "Failed to exchange code for token");

        let err = AuthError::Config("JWT_SECRET is required".into());
        assert_eq!(err.public_message(), "Internal error");
    }

    #[test]
    fn token_errors_keep_their_message() {
        let err: AuthError = TokenError::Expired.into();
        assert_eq!(err.public_message(), "Token expired");
    }
}
