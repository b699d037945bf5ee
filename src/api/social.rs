//! Social graph endpoints
//!
//! Backing for the follow button, the find-friends screen and the
//! recipient picker of the recommendation modal.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use super::dto::{
    AcceptRequestBody, FetchParams, RelationshipResponse, RequestActionResponse, SocialResponse,
};
use super::extract::CurrentUser;
use crate::AppState;
use crate::data::Profile;
use crate::error::AppError;

/// GET /api/v1/social
///
/// Refreshes the follow graph (subject to the cache TTL unless
/// `force=true`) and returns all four views.
pub async fn get_social(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Query(params): Query<FetchParams>,
) -> Json<SocialResponse> {
    let outcome = state.social.fetch_follow_data(params.force).await;
    let snapshot = state.social.snapshot().await;
    Json(SocialResponse { outcome, snapshot })
}

/// GET /api/v1/social/following
pub async fn get_following(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
) -> Json<Vec<Profile>> {
    state.social.fetch_follow_data(false).await;
    Json(state.social.following().await)
}

/// GET /api/v1/social/status/:user_id
pub async fn get_follow_status(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(user_id): Path<String>,
) -> Json<RelationshipResponse> {
    let status = state.social.get_follow_status(&user_id).await;
    Json(RelationshipResponse { user_id, status })
}

/// POST /api/v1/social/follow/:user_id
pub async fn follow_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<RelationshipResponse>, AppError> {
    if user_id == session.user_id {
        return Err(AppError::Validation("cannot follow yourself".to_string()));
    }

    if !state.social.follow(&user_id).await {
        return Err(AppError::Backend("follow request failed".to_string()));
    }

    let status = state.social.get_follow_status(&user_id).await;
    Ok(Json(RelationshipResponse { user_id, status }))
}

/// DELETE /api/v1/social/follow/:user_id
pub async fn unfollow_user(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<RelationshipResponse>, AppError> {
    if !state.social.unfollow(&user_id).await {
        return Err(AppError::Backend("unfollow failed".to_string()));
    }

    let status = state.social.get_follow_status(&user_id).await;
    Ok(Json(RelationshipResponse { user_id, status }))
}

/// POST /api/v1/social/requests/:id/accept
///
/// 404 when no pending request with this id is addressed to the user.
pub async fn accept_request(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<AcceptRequestBody>,
) -> Result<Json<RequestActionResponse>, AppError> {
    match state.social.try_accept_request(&id, &body.follower_id).await {
        Ok(true) => Ok(Json(RequestActionResponse { id, accepted: true })),
        Ok(false) => Err(AppError::NotFound),
        Err(AppError::Unauthorized) => Err(AppError::Unauthorized),
        Err(_) => Err(AppError::Backend(
            "accepting follow request failed".to_string(),
        )),
    }
}

/// POST /api/v1/social/requests/:id/decline
pub async fn decline_request(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<RequestActionResponse>, AppError> {
    if !state.social.decline_request(&id).await {
        return Err(AppError::Backend("declining follow request failed".to_string()));
    }

    Ok(Json(RequestActionResponse {
        id,
        accepted: false,
    }))
}
