//! `POST /signin`: verify credentials, open a session, and issue a signed token.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{
    error::AuthError,
    session::SessionManager,
    state::AuthState,
    types::{ErrorResponse, SignInRequest, SignInResponse},
    utils::valid_username,
};

#[utoipa::path(
    post,
    path = "/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "User signed in; session cookie set", body = SignInResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 500, description = "Credential or session store unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn sign_in(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(request) = payload.map_err(|rejection| AuthError::Validation(rejection.body_text()))?;

    let username = request.username.trim();
    if !valid_username(username) {
        return Err(AuthError::Validation("Invalid username".to_string()));
    }
    if request.password.is_empty() {
        return Err(AuthError::Validation("Missing password".to_string()));
    }

    let authorized = auth_state
        .verifier()
        .verify(username, &request.password)
        .await?;

    // Sign first so a signing failure leaves no session behind.
    let issued = auth_state
        .signer()
        .issue_initial(authorized.username(), Utc::now())?;

    let sessions = auth_state.sessions();
    // The presented session is dropped only after its replacement exists.
    let token = sessions
        .establish(authorized.username())
        .await
        .map_err(AuthError::Internal)?;
    let cookie = match sessions.session_cookie(&token) {
        Ok(cookie) => cookie,
        Err(err) => {
            discard_quietly(sessions, &token).await;
            return Err(AuthError::Internal(err.into()));
        }
    };
    if let Err(err) = sessions.clear(&headers).await {
        discard_quietly(sessions, &token).await;
        return Err(AuthError::Internal(err));
    }

    info!(username = authorized.username(), "user signed in");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok((
        StatusCode::OK,
        response_headers,
        Json(SignInResponse {
            message: "User signed in".to_string(),
            token: issued.token,
            expires: issued.expires,
        }),
    ))
}

async fn discard_quietly(sessions: &SessionManager, token: &str) {
    if let Err(err) = sessions.discard(token).await {
        error!("Failed to discard unused session: {err}");
    }
}
