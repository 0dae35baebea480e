//! End-to-end login against an in-process fake Google.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use juno_auth::middleware::{AuthConfig, auth_routes};
use juno_auth::{AuthClient, IdentityStore, MemoryIdentityStore, OAuthConfig, TokenKeys};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

const SECRET: &str = "juno_rideshare_secret";

async fn fake_token(Form(form): Form<HashMap<String, String>>) -> Response {
    let valid = form.get("code").map(String::as_str) == Some("validcode")
        && form.get("code_verifier").is_some_and(|v| !v.is_empty())
        && form.get("client_secret").map(String::as_str) == Some("test-secret");
    if valid {
        Json(json!({ "access_token": "access-1", "token_type": "Bearer", "expires_in": 3599 }))
            .into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response()
    }
}

async fn fake_userinfo(headers: HeaderMap) -> Response {
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer access-1") => Json(json!({
            "id": "g-123",
            "email": "bob@example.com",
            "verified_email": true,
            "given_name": "Bob",
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn spawn_fake_google() -> SocketAddr {
    let app = Router::new()
        .route("/token", post(fake_token))
        .route("/userinfo", get(fake_userinfo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn app() -> Router {
    app_with(|config| config).await
}

async fn app_with(customize: impl FnOnce(AuthConfig) -> AuthConfig) -> Router {
    app_over(customize, Arc::new(MemoryIdentityStore::new())).await
}

async fn app_over(
    customize: impl FnOnce(AuthConfig) -> AuthConfig,
    store: Arc<MemoryIdentityStore>,
) -> Router {
    let google = spawn_fake_google().await;
    let oauth = OAuthConfig::new(
        "test-client",
        "test-secret",
        "http://localhost:8080/auth/google/callback".parse().unwrap(),
    )
    .with_token_url(format!("http://{google}/token").parse().unwrap())
    .with_userinfo_url(format!("http://{google}/userinfo").parse().unwrap());

    let config = AuthConfig::new(AuthClient::new(oauth).unwrap(), TokenKeys::new(SECRET))
        .with_secure_cookies(false);
    auth_routes(customize(config), store)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Start a login; returns the state from the redirect and the cookie header
/// to send back on the callback.
async fn begin_login(app: &Router) -> (String, String) {
    let response = app.clone().oneshot(get_request("/auth/google")).await.unwrap();
    assert!(response.status().is_redirection());

    let location = response.headers()[LOCATION].to_str().unwrap();
    let url = Url::parse(location).unwrap();
    let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(query["client_id"], "test-client");
    assert_eq!(query["code_challenge_method"], "S256");

    let cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .collect::<Vec<_>>()
        .join("; ");
    assert!(!cookies.is_empty());

    (query["state"].clone(), cookies)
}

async fn callback(app: &Router, query: &str, cookies: &str) -> Response {
    let request = Request::builder()
        .uri(format!("/auth/google/callback?{query}"))
        .header(COOKIE, cookies)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn me(app: &Router, authorization: Option<&str>) -> Response {
    let mut request = Request::builder().uri("/auth/me");
    if let Some(value) = authorization {
        request = request.header(AUTHORIZATION, value);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn full_login_issues_token_for_new_identity() {
    let app = app().await;
    let (state, cookies) = begin_login(&app).await;

    let response = callback(&app, &format!("code=validcode&state={state}"), &cookies).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["user"]["username"], "bob");
    assert_eq!(body["user"]["email"], "bob@example.com");
    assert_eq!(body["user"]["firstName"], "Bob");
    let token = body["token"].as_str().unwrap();

    let claims = TokenKeys::new(SECRET).verify(token).unwrap();
    assert_eq!(claims.email, "bob@example.com");
    assert_eq!(i64::from(claims.user_id()), body["user"]["id"].as_i64().unwrap());

    let response = me(&app, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["username"], "bob");
}

#[tokio::test]
async fn second_login_resolves_same_identity() {
    let app = app().await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let (state, cookies) = begin_login(&app).await;
        let response = callback(&app, &format!("code=validcode&state={state}"), &cookies).await;
        assert_eq!(response.status(), StatusCode::OK);
        ids.push(json_body(response).await["user"]["id"].clone());
    }
    assert_eq!(ids[0], ids[1]);
}

#[tokio::test]
async fn state_mismatch_is_unauthorized() {
    let app = app().await;
    let (_, cookies) = begin_login(&app).await;

    let response = callback(&app, "code=validcode&state=forged", &cookies).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn callback_without_retained_state_is_unauthorized() {
    let app = app().await;
    let (state, _) = begin_login(&app).await;

    let response = callback(&app, &format!("code=validcode&state={state}"), "").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_code_is_bad_request() {
    let app = app().await;
    let (state, cookies) = begin_login(&app).await;

    let response = callback(&app, &format!("state={state}"), &cookies).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Authorization code not found"
    );
}

#[tokio::test]
async fn provider_error_is_unauthorized() {
    let app = app().await;
    let (state, cookies) = begin_login(&app).await;

    let response = callback(&app, &format!("error=access_denied&state={state}"), &cookies).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejected_code_is_server_error() {
    let app = app().await;
    let (state, cookies) = begin_login(&app).await;

    let response = callback(&app, &format!("code=wrongcode&state={state}"), &cookies).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Failed to exchange code for token"
    );
}

#[tokio::test]
async fn me_requires_valid_bearer() {
    let app = app().await;

    let response = me(&app, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Missing bearer token");

    let response = me(&app, Some("Bearer garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid token");

    let response = me(&app, Some("Basic Ym9iOnB3")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_acknowledges() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Logged out successfully");
}

#[tokio::test]
async fn dev_login_is_not_mounted_by_default() {
    let app = app().await;
    let response = app.oneshot(get_request("/auth/dev-login")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dev_login_issues_token_when_enabled() {
    let app = app_with(|config| config.with_dev_login_enabled(true)).await;

    let response = app
        .clone()
        .oneshot(get_request("/auth/dev-login?email=carol@juno.edu"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user"]["username"], "carol");

    let token = body["token"].as_str().unwrap();
    let response = me(&app, Some(&format!("bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn dev_login_reuses_account_without_relinking() {
    let store = Arc::new(MemoryIdentityStore::new());
    let app = app_over(|config| config.with_dev_login_enabled(true), store.clone()).await;

    let (state, cookies) = begin_login(&app).await;
    let response = callback(&app, &format!("code=validcode&state={state}"), &cookies).await;
    let google_id = json_body(response).await["user"]["id"].clone();

    let response = app
        .clone()
        .oneshot(get_request("/auth/dev-login?email=bob@example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["id"], google_id);

    let linked = store.find_by_provider_id("g-123").await.unwrap();
    assert_eq!(linked.map(|i| i.username).as_deref(), Some("bob"));
    assert_eq!(store.len(), 1);
}
