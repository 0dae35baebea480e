use std::time::Duration;

use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::AuthError;
use crate::oauth::{AuthClient, IdentityProvider, OAuthConfig};
use crate::token::TokenKeys;

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) provider_segment: String,
    pub(crate) dev_login_enabled: bool,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            secure_cookies: true,
            auth_path: "/auth".into(),
            provider_segment: "google".into(),
            dev_login_enabled: false,
        }
    }
}

/// Authentication configuration, built once at startup.
///
/// Required collaborators (`provider`, `keys`) are constructor parameters.
/// Use [`from_env()`](AuthConfig::from_env) for the deployed server, or
/// [`new()`](AuthConfig::new) with `with_*` methods for full control.
pub struct AuthConfig<P = AuthClient> {
    pub(super) provider: P,
    pub(super) keys: TokenKeys,
    pub(super) settings: AuthSettings,
}

impl<P: IdentityProvider> AuthConfig<P> {
    /// Create config from a provider client and token keys.
    ///
    /// Optional fields use defaults: auth path `/auth`, provider segment
    /// `google`, secure cookies, ephemeral cookie key, no dev login.
    ///
    /// Nothing is checked here; call [`validate()`](AuthConfig::validate)
    /// before serving ([`from_env()`](AuthConfig::from_env) does).
    #[must_use]
    pub fn new(provider: P, keys: TokenKeys) -> Self {
        Self {
            provider,
            keys,
            settings: AuthSettings::defaults(),
        }
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into().trim_end_matches('/').to_string();
        self
    }

    /// Path segment naming the provider (`/auth/<segment>`).
    #[must_use]
    pub fn with_provider_segment(mut self, segment: impl Into<String>) -> Self {
        self.settings.provider_segment = segment.into();
        self
    }

    #[must_use]
    pub fn with_dev_login_enabled(mut self, enabled: bool) -> Self {
        self.settings.dev_login_enabled = enabled;
        self
    }

    #[must_use]
    pub fn token_keys(&self) -> &TokenKeys {
        &self.keys
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn auth_path(&self) -> &str {
        &self.settings.auth_path
    }

    #[must_use]
    pub fn dev_login_enabled(&self) -> bool {
        self.settings.dev_login_enabled
    }
}

impl AuthConfig<AuthClient> {
    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `GOOGLE_CLIENT_ID`: OAuth2 client ID
    /// - `GOOGLE_CLIENT_SECRET`: OAuth2 client secret
    /// - `OAUTH_REDIRECT_URL`: callback URL registered with Google
    /// - `JWT_SECRET`: session token signing secret
    ///
    /// # Optional env vars
    /// - `GOOGLE_AUTH_URL`, `GOOGLE_TOKEN_URL`, `GOOGLE_USERINFO_URL`: endpoint overrides
    /// - `OAUTH_SCOPES`: comma-separated scopes
    /// - `OAUTH_HTTP_TIMEOUT_SECS`: provider request timeout (default 10)
    /// - `AUTH_PATH`: route prefix (default `/auth`)
    /// - `DEV_AUTH`: `"1"` or `"true"` enables the dev-login route and disables secure cookies
    /// - `COOKIE_KEY`: cookie encryption key bytes (at least 64)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a required var is missing or empty, or
    /// an optional one is malformed. Callers should treat this as fatal.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) with an explicit variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AuthError::Config(format!("{name} is required")))
        };
        let parse_url = |name: &str, value: String| {
            value
                .parse::<Url>()
                .map_err(|e| AuthError::Config(format!("{name}: {e}")))
        };

        let client_id = required("GOOGLE_CLIENT_ID")?;
        let client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let redirect_uri = parse_url("OAUTH_REDIRECT_URL", required("OAUTH_REDIRECT_URL")?)?;
        let jwt_secret = required("JWT_SECRET")?;

        let mut oauth = OAuthConfig::new(client_id, client_secret, redirect_uri);

        if let Some(v) = lookup("GOOGLE_AUTH_URL") {
            oauth = oauth.with_auth_url(parse_url("GOOGLE_AUTH_URL", v)?);
        }
        if let Some(v) = lookup("GOOGLE_TOKEN_URL") {
            oauth = oauth.with_token_url(parse_url("GOOGLE_TOKEN_URL", v)?);
        }
        if let Some(v) = lookup("GOOGLE_USERINFO_URL") {
            oauth = oauth.with_userinfo_url(parse_url("GOOGLE_USERINFO_URL", v)?);
        }
        if let Some(scopes) = lookup("OAUTH_SCOPES") {
            oauth = oauth.with_scopes(
                scopes
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
        if let Some(secs) = lookup("OAUTH_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| AuthError::Config(format!("OAUTH_HTTP_TIMEOUT_SECS: {e}")))?;
            oauth = oauth.with_http_timeout(Duration::from_secs(secs));
        }

        let dev_auth = matches!(lookup("DEV_AUTH").as_deref(), Some("1" | "true"));

        let cookie_key = match lookup("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => Key::generate(),
        };

        let client = AuthClient::new(oauth)
            .map_err(|e| AuthError::Config(format!("HTTP client: {e}")))?;

        let mut config = Self::new(client, TokenKeys::new(jwt_secret))
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_auth)
            .with_dev_login_enabled(dev_auth);
        if let Some(path) = lookup("AUTH_PATH") {
            config = config.with_auth_path(path);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject credentials that would make every login fail.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the client id, client secret or token
    /// secret is empty.
    pub fn validate(&self) -> Result<(), AuthError> {
        let oauth = self.provider.config();
        if oauth.client_id.trim().is_empty() {
            return Err(AuthError::Config("OAuth client id is empty".into()));
        }
        if oauth.client_secret.trim().is_empty() {
            return Err(AuthError::Config("OAuth client secret is empty".into()));
        }
        if !self.keys.has_secret() {
            return Err(AuthError::Config("token signing secret is empty".into()));
        }
        Ok(())
    }
}
