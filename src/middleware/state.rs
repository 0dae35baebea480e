use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use crate::login::LoginExchanger;
use crate::token::TokenKeys;

/// Shared state for auth route handlers.
pub(super) struct AuthState<P, S> {
    pub(super) exchanger: Arc<LoginExchanger<P, S>>,
    pub(super) keys: TokenKeys,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding `P: Clone, S: Clone` bounds.
impl<P, S> Clone for AuthState<P, S> {
    fn clone(&self) -> Self {
        Self {
            exchanger: self.exchanger.clone(),
            keys: self.keys.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<P, S> FromRef<AuthState<P, S>> for Key {
    fn from_ref(state: &AuthState<P, S>) -> Self {
        state.settings.cookie_key.clone()
    }
}

// AuthUser requires TokenKeys
impl<P, S> FromRef<AuthState<P, S>> for TokenKeys {
    fn from_ref(state: &AuthState<P, S>) -> Self {
        state.keys.clone()
    }
}
