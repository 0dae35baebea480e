use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::login::RetainedExchange;

const STATE_COOKIE_NAME: &str = "__juno_oauth_state";
const PKCE_COOKIE_NAME: &str = "__juno_pkce";

/// Short-lived cookie carrying one half of the retained exchange.
fn exchange_cookie(name: &'static str, value: &str, secure: bool, auth_path: &str) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(auth_path.to_string())
        .max_age(Duration::minutes(5))
        .build()
}

fn removal_cookie(name: &'static str, auth_path: &str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path(auth_path.to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Retain state and PKCE verifier until the callback.
pub(super) fn retain_exchange(
    jar: PrivateCookieJar,
    retained: &RetainedExchange,
    secure: bool,
    auth_path: &str,
) -> PrivateCookieJar {
    jar.add(exchange_cookie(STATE_COOKIE_NAME, &retained.state, secure, auth_path))
        .add(exchange_cookie(PKCE_COOKIE_NAME, &retained.code_verifier, secure, auth_path))
}

/// Read the retained exchange. Both halves must be present.
pub(super) fn retained_exchange(jar: &PrivateCookieJar) -> Option<RetainedExchange> {
    let state = jar.get(STATE_COOKIE_NAME)?.value().to_string();
    let code_verifier = jar.get(PKCE_COOKIE_NAME)?.value().to_string();
    Some(RetainedExchange { state, code_verifier })
}

/// Discard the retained exchange; a state is good for one callback only.
pub(super) fn discard_exchange(jar: PrivateCookieJar, auth_path: &str) -> PrivateCookieJar {
    jar.remove(removal_cookie(STATE_COOKIE_NAME, auth_path))
        .remove(removal_cookie(PKCE_COOKIE_NAME, auth_path))
}
