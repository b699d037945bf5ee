//! Profile search for the find-friends screen

use axum::{
    Json,
    extract::{Query, State},
};

use super::dto::SearchParams;
use super::extract::CurrentUser;
use crate::AppState;
use crate::data::Profile;
use crate::error::AppError;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 50;

/// GET /api/v1/profiles/search?q=
pub async fn search_profiles(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Profile>>, AppError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(AppError::Validation("q cannot be empty".to_string()));
    }

    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let profiles = state
        .backend
        .search_profiles(query, &session.user_id, limit)
        .await?;

    Ok(Json(profiles))
}
