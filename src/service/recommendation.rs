//! Recommendation service
//!
//! Sends a movie or show to people the user follows and lists the
//! recommendations the user has received.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use super::social::SocialStore;
use crate::data::{EntityId, MediaType, NewRecommendation, Recommendation, SocialBackend};
use crate::error::AppError;
use crate::metrics::RECOMMENDATIONS_SENT_TOTAL;
use crate::session::SessionContext;

const MAX_MESSAGE_CHARS: usize = 500;
const MAX_RECIPIENTS: usize = 50;

/// Title being recommended
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub media_id: i64,
    pub media_type: MediaType,
    pub title: String,
}

/// Recommendation service
pub struct RecommendationService {
    backend: Arc<dyn SocialBackend>,
    session: Arc<SessionContext>,
    social: Arc<SocialStore>,
}

impl RecommendationService {
    /// Create new recommendation service
    pub fn new(
        backend: Arc<dyn SocialBackend>,
        session: Arc<SessionContext>,
        social: Arc<SocialStore>,
    ) -> Self {
        Self {
            backend,
            session,
            social,
        }
    }

    /// Recommend a title to one or more followed users
    ///
    /// Recipients must be in the user's `following` view; the follow data
    /// is refreshed first if the cache is stale. Duplicate recipients are
    /// collapsed. The rows are stored as one batch, so a failure stores
    /// nothing.
    ///
    /// # Returns
    /// The inserted recommendations
    ///
    /// # Errors
    /// `Unauthorized` without a session, `Validation` for bad input or
    /// recipients the user does not follow, backend errors otherwise
    pub async fn send(
        &self,
        recipient_ids: &[String],
        media: MediaRef,
        message: Option<String>,
    ) -> Result<Vec<NewRecommendation>, AppError> {
        let sender_id = self.session.user_id().await.ok_or(AppError::Unauthorized)?;

        let recipients: BTreeSet<&str> = recipient_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(AppError::Validation(
                "at least one recipient is required".to_string(),
            ));
        }
        if recipients.len() > MAX_RECIPIENTS {
            return Err(AppError::Validation(format!(
                "at most {} recipients are allowed",
                MAX_RECIPIENTS
            )));
        }

        let title = media.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }
        if media.media_id <= 0 {
            return Err(AppError::Validation("media_id must be positive".to_string()));
        }

        let message = message
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if message
            .as_ref()
            .is_some_and(|text| text.chars().count() > MAX_MESSAGE_CHARS)
        {
            return Err(AppError::Validation(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        self.social.fetch_follow_data(false).await;
        let following: BTreeSet<String> = self
            .social
            .following()
            .await
            .into_iter()
            .map(|profile| profile.user_id)
            .collect();
        let not_followed: Vec<&str> = recipients
            .iter()
            .copied()
            .filter(|id| !following.contains(*id))
            .collect();
        if !not_followed.is_empty() {
            return Err(AppError::Validation(format!(
                "recipients must be users you follow: {}",
                not_followed.join(", ")
            )));
        }

        let created_at = Utc::now();
        let rows: Vec<NewRecommendation> = recipients
            .into_iter()
            .map(|recipient_id| NewRecommendation {
                id: EntityId::new().0,
                sender_id: sender_id.clone(),
                recipient_id: recipient_id.to_string(),
                media_id: media.media_id,
                media_type: media.media_type,
                title: title.to_string(),
                message: message.clone(),
                created_at,
            })
            .collect();

        self.backend.insert_recommendations(&rows).await?;

        RECOMMENDATIONS_SENT_TOTAL.inc_by(rows.len() as u64);
        tracing::info!(
            sender_id = %sender_id,
            media_id = media.media_id,
            media_type = media.media_type.as_str(),
            recipients = rows.len(),
            "Recommendation sent"
        );

        Ok(rows)
    }

    /// Recommendations received by the signed-in user, newest first
    pub async fn inbox(&self, limit: usize) -> Result<Vec<Recommendation>, AppError> {
        let recipient_id = self.session.user_id().await.ok_or(AppError::Unauthorized)?;
        self.backend
            .list_recommendations(&recipient_id, limit.clamp(1, 100))
            .await
    }

    /// Mark a received recommendation as read
    pub async fn mark_read(&self, id: &str) -> Result<(), AppError> {
        let recipient_id = self.session.user_id().await.ok_or(AppError::Unauthorized)?;
        if self
            .backend
            .mark_recommendation_read(id, &recipient_id)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}
