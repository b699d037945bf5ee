//! Request extractors

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::AppState;
use crate::error::AppError;
use crate::session::Session;

/// Extractor for the signed-in user
///
/// Rejects with 401 when no session is active.
pub struct CurrentUser(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .session
            .current()
            .await
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
