use super::{
    AuthConfig, AuthState, MemoryCredentialStore, MemorySessionStore, SessionStore, refresh,
    signin, signout,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::Extension,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
    response::Response,
    routing::post,
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tower::ServiceExt;

use super::session::SessionRecord;

struct FailingSessions;

#[async_trait]
impl SessionStore for FailingSessions {
    async fn insert(&self, _: &[u8], _: &str, _: i64) -> Result<bool> {
        Err(anyhow!("sessions offline"))
    }
    async fn lookup(&self, _: &[u8]) -> Result<Option<SessionRecord>> {
        Err(anyhow!("sessions offline"))
    }
    async fn delete(&self, _: &[u8]) -> Result<()> {
        Err(anyhow!("sessions offline"))
    }
    async fn purge_expired(&self) -> Result<u64> {
        Err(anyhow!("sessions offline"))
    }
}

/// Memory store that starts failing inserts after `inserts_allowed` calls and
/// fails the next `deletes_failing` deletes.
struct FlakySessions {
    inner: MemorySessionStore,
    inserts_allowed: usize,
    inserts: AtomicUsize,
    deletes_failing: AtomicUsize,
}

impl FlakySessions {
    fn new(inserts_allowed: usize, deletes_failing: usize) -> Self {
        Self {
            inner: MemorySessionStore::new(),
            inserts_allowed,
            inserts: AtomicUsize::new(0),
            deletes_failing: AtomicUsize::new(deletes_failing),
        }
    }
}

#[async_trait]
impl SessionStore for FlakySessions {
    async fn insert(&self, hash: &[u8], username: &str, ttl: i64) -> Result<bool> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.inserts_allowed {
            return Err(anyhow!("sessions offline"));
        }
        self.inner.insert(hash, username, ttl).await
    }
    async fn lookup(&self, hash: &[u8]) -> Result<Option<SessionRecord>> {
        self.inner.lookup(hash).await
    }
    async fn delete(&self, hash: &[u8]) -> Result<()> {
        let failing = self
            .deletes_failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("sessions offline"));
        }
        self.inner.delete(hash).await
    }
    async fn purge_expired(&self) -> Result<u64> {
        self.inner.purge_expired().await
    }
}

async fn auth_state(sessions: Arc<dyn SessionStore>) -> Result<Arc<AuthState>> {
    let credentials = MemoryCredentialStore::new();
    credentials.insert("alice", "secret").await;
    Ok(Arc::new(AuthState::new(
        AuthConfig::new(),
        Arc::new(credentials),
        sessions,
        SecretString::from("handler-test-secret".to_string()),
    )?))
}

fn app(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/signin", post(signin::sign_in))
        .route("/refresh", post(refresh::refresh))
        .route("/signout", post(signout::sign_out))
        .layer(Extension(state))
}

fn signin_request(body: &str, cookie: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/signin")
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

fn refresh_request(authorization: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("POST").uri("/refresh");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    Ok(builder.body(Body::empty())?)
}

fn signout_request(cookie: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("POST").uri("/signout");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(builder.body(Body::empty())?)
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `name=value` pair from the response's `Set-Cookie` header.
fn cookie_pair(response: &Response) -> Result<String> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .ok_or_else(|| anyhow!("missing set-cookie"))?
        .to_str()?;
    header
        .split(';')
        .next()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("empty set-cookie"))
}

#[tokio::test]
async fn signin_sets_cookie_and_returns_token() -> Result<()> {
    let state = auth_state(Arc::new(MemorySessionStore::new())).await?;
    let response = app(state.clone())
        .oneshot(signin_request(
            r#"{"username":"alice","password":"secret"}"#,
            None,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = cookie_pair(&response)?;
    assert!(cookie.starts_with("recipes_session="));

    let body = json_body(response).await?;
    assert_eq!(body["message"], "User signed in");
    let token = body["token"]
        .as_str()
        .ok_or_else(|| anyhow!("token missing"))?;
    let claims = state.signer().verify(token)?;
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.exp - claims.iat, 300);

    let headers = {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(COOKIE, cookie.parse()?);
        headers
    };
    let record = state.sessions().current(&headers).await?;
    assert_eq!(record.map(|r| r.username), Some("alice".to_string()));
    Ok(())
}

#[tokio::test]
async fn signin_rejects_bad_credentials_without_cookie() -> Result<()> {
    let state = auth_state(Arc::new(MemorySessionStore::new())).await?;
    for body in [
        r#"{"username":"alice","password":"wrong"}"#,
        r#"{"username":"mallory","password":"secret"}"#,
    ] {
        let response = app(state.clone()).oneshot(signin_request(body, None)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = json_body(response).await?;
        assert_eq!(body["error"], "Invalid username or password");
    }
    Ok(())
}

#[tokio::test]
async fn signin_rejects_malformed_body() -> Result<()> {
    let state = auth_state(Arc::new(MemorySessionStore::new())).await?;
    for body in [
        "not json",
        r#"{"username":"alice"}"#,
        r#"{"username":"","password":"secret"}"#,
        r#"{"username":"alice","password":""}"#,
        r#"{"username":"bad user!","password":"secret"}"#,
    ] {
        let response = app(state.clone()).oneshot(signin_request(body, None)?).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert!(response.headers().get(SET_COOKIE).is_none());
    }
    Ok(())
}

#[tokio::test]
async fn signin_replaces_existing_session() -> Result<()> {
    let sessions = Arc::new(MemorySessionStore::new());
    let state = auth_state(sessions.clone()).await?;
    let body = r#"{"username":"alice","password":"secret"}"#;

    let first = app(state.clone()).oneshot(signin_request(body, None)?).await?;
    let first_cookie = cookie_pair(&first)?;
    assert_eq!(sessions.len().await, 1);

    let second = app(state.clone())
        .oneshot(signin_request(body, Some(&first_cookie))?)
        .await?;
    assert_eq!(second.status(), StatusCode::OK);
    let second_cookie = cookie_pair(&second)?;
    assert_ne!(first_cookie, second_cookie);
    assert_eq!(sessions.len().await, 1);

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(COOKIE, first_cookie.parse()?);
    assert!(state.sessions().current(&headers).await?.is_none());
    Ok(())
}

fn cookie_headers(cookie: &str) -> Result<axum::http::HeaderMap> {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(COOKIE, cookie.parse()?);
    Ok(headers)
}

#[tokio::test]
async fn failed_resignin_keeps_existing_session() -> Result<()> {
    let sessions = Arc::new(FlakySessions::new(1, 0));
    let state = auth_state(sessions.clone()).await?;
    let body = r#"{"username":"alice","password":"secret"}"#;

    let first = app(state.clone()).oneshot(signin_request(body, None)?).await?;
    assert_eq!(first.status(), StatusCode::OK);
    let first_cookie = cookie_pair(&first)?;

    let second = app(state.clone())
        .oneshot(signin_request(body, Some(&first_cookie))?)
        .await?;
    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(second.headers().get(SET_COOKIE).is_none());

    let record = state.sessions().current(&cookie_headers(&first_cookie)?).await?;
    assert_eq!(record.map(|r| r.username), Some("alice".to_string()));
    Ok(())
}

#[tokio::test]
async fn resignin_discards_new_session_when_old_cannot_be_removed() -> Result<()> {
    let sessions = Arc::new(FlakySessions::new(usize::MAX, 0));
    let state = auth_state(sessions.clone()).await?;
    let body = r#"{"username":"alice","password":"secret"}"#;

    let first = app(state.clone()).oneshot(signin_request(body, None)?).await?;
    let first_cookie = cookie_pair(&first)?;
    assert_eq!(sessions.inner.len().await, 1);

    sessions.deletes_failing.store(1, Ordering::SeqCst);
    let second = app(state.clone())
        .oneshot(signin_request(body, Some(&first_cookie))?)
        .await?;
    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(second.headers().get(SET_COOKIE).is_none());

    // Only the original session is left, and it still resolves.
    assert_eq!(sessions.inner.len().await, 1);
    let record = state.sessions().current(&cookie_headers(&first_cookie)?).await?;
    assert_eq!(record.map(|r| r.username), Some("alice".to_string()));
    Ok(())
}

#[tokio::test]
async fn signin_reports_store_failure() -> Result<()> {
    let state = auth_state(Arc::new(FailingSessions)).await?;
    let response = app(state)
        .oneshot(signin_request(
            r#"{"username":"alice","password":"secret"}"#,
            None,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn refresh_too_early_is_bad_request() -> Result<()> {
    let state = auth_state(Arc::new(MemorySessionStore::new())).await?;
    let issued = state.signer().issue_initial("alice", Utc::now())?;

    let response = app(state)
        .oneshot(refresh_request(Some(&issued.token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert_eq!(body["error"], "Token is not expired yet");
    Ok(())
}

#[tokio::test]
async fn refresh_inside_window_renews() -> Result<()> {
    let state = auth_state(Arc::new(MemorySessionStore::new())).await?;
    let issued = state
        .signer()
        .issue_initial("alice", Utc::now() - Duration::seconds(280))?;

    for authorization in [issued.token.clone(), format!("Bearer {}", issued.token)] {
        let response = app(state.clone())
            .oneshot(refresh_request(Some(&authorization))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        let token = body["token"]
            .as_str()
            .ok_or_else(|| anyhow!("token missing"))?;
        let claims = state.signer().verify(token)?;
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > issued.expires.timestamp());
    }
    Ok(())
}

#[tokio::test]
async fn refresh_after_expiry_renews() -> Result<()> {
    let state = auth_state(Arc::new(MemorySessionStore::new())).await?;
    let issued = state
        .signer()
        .issue_initial("alice", Utc::now() - Duration::hours(2))?;

    let response = app(state)
        .oneshot(refresh_request(Some(&issued.token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn refresh_rejects_missing_or_forged_token() -> Result<()> {
    let state = auth_state(Arc::new(MemorySessionStore::new())).await?;
    let issued = state
        .signer()
        .issue_initial("alice", Utc::now() - Duration::seconds(290))?;
    let tampered = format!("{}x", issued.token);

    for authorization in [None, Some("garbage"), Some("Bearer "), Some(tampered.as_str())] {
        let response = app(state.clone())
            .oneshot(refresh_request(authorization)?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await?;
        assert_eq!(body["error"], "Invalid token");
    }
    Ok(())
}

#[tokio::test]
async fn signout_clears_session_and_is_idempotent() -> Result<()> {
    let sessions = Arc::new(MemorySessionStore::new());
    let state = auth_state(sessions.clone()).await?;
    let token = state.sessions().establish("alice").await?;
    let cookie = format!("recipes_session={token}");

    for attempt in [Some(cookie.as_str()), Some(cookie.as_str()), None] {
        let response = app(state.clone()).oneshot(signout_request(attempt)?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .ok_or_else(|| anyhow!("missing set-cookie"))?
            .to_str()?
            .to_string();
        assert!(set_cookie.contains("Max-Age=0"));
        let body = json_body(response).await?;
        assert_eq!(body["message"], "Signed out...");
    }
    assert!(sessions.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn signout_reports_store_failure() -> Result<()> {
    let state = auth_state(Arc::new(FailingSessions)).await?;
    let response = app(state)
        .oneshot(signout_request(Some("recipes_session=abc"))?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}
