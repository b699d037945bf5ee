//! Session endpoints
//!
//! The UI shell signs in against the hosted auth service and hands the
//! resulting user id and access token to this process.

use axum::{Json, extract::State, http::StatusCode};

use super::dto::{SessionResponse, SignInRequest};
use super::extract::CurrentUser;
use crate::AppState;
use crate::error::AppError;
use crate::session::Session;

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            signed_in_at: session.signed_in_at,
        }
    }
}

/// POST /api/v1/session
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }

    let access_token = request
        .access_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    let session = Session::new(user_id, access_token);
    let response = SessionResponse::from(&session);

    let previous = state.session.sign_in(session).await;
    if previous.is_some_and(|previous| previous.user_id != user_id) {
        state.social.reset().await;
    }

    Ok(Json(response))
}

/// GET /api/v1/session
pub async fn get_session(CurrentUser(session): CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse::from(&session))
}

/// DELETE /api/v1/session
pub async fn sign_out(State(state): State<AppState>) -> StatusCode {
    state.session.sign_out().await;
    state.social.reset().await;
    StatusCode::NO_CONTENT
}
