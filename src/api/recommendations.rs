//! Recommendation endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::dto::{InboxParams, SendRecommendationRequest, SendRecommendationResponse};
use super::extract::CurrentUser;
use crate::AppState;
use crate::data::Recommendation;
use crate::error::AppError;
use crate::service::MediaRef;

/// POST /api/v1/recommendations
pub async fn send_recommendation(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Json(request): Json<SendRecommendationRequest>,
) -> Result<(StatusCode, Json<SendRecommendationResponse>), AppError> {
    let media = MediaRef {
        media_id: request.media_id,
        media_type: request.media_type,
        title: request.title,
    };
    let rows = state
        .recommendations
        .send(&request.recipient_ids, media, request.message)
        .await?;

    let response = SendRecommendationResponse {
        ids: rows.iter().map(|row| row.id.clone()).collect(),
        recipients: rows.into_iter().map(|row| row.recipient_id).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/recommendations
pub async fn list_recommendations(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Query(params): Query<InboxParams>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let limit = params.limit.unwrap_or(20);
    Ok(Json(state.recommendations.inbox(limit).await?))
}

/// POST /api/v1/recommendations/:id/read
pub async fn mark_recommendation_read(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.recommendations.mark_read(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
