//! Social backend abstraction
//!
//! The relational store that owns the `follows`, `profiles` and
//! `recommendations` tables. Every filter here is scoped the same way in
//! each implementation: a mutation only touches rows the signed-in user is
//! allowed to touch.

use async_trait::async_trait;

use super::models::{FollowRow, NewRecommendation, Profile, Recommendation};
use crate::error::AppError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialBackend: Send + Sync {
    /// Short name used in logs and metric labels
    fn name(&self) -> &'static str;

    /// All follow rows where `user_id` is either the follower or the
    /// followee, with both profiles joined.
    async fn fetch_relationships(&self, user_id: &str) -> Result<Vec<FollowRow>, AppError>;

    /// Insert a pending follow from `follower_id` to `following_id`.
    async fn insert_follow(&self, follower_id: &str, following_id: &str) -> Result<(), AppError>;

    /// Delete the row keyed by (`follower_id`, `following_id`).
    async fn delete_follow(&self, follower_id: &str, following_id: &str) -> Result<(), AppError>;

    /// Flip a pending row to accepted. Scoped to rows where
    /// `following_id` is the accepting user. Returns `false` when no row
    /// matched.
    async fn accept_follow(&self, row_id: &str, following_id: &str) -> Result<bool, AppError>;

    /// Delete a follow request. Scoped to rows where `following_id` is the
    /// declining user.
    async fn delete_follow_request(&self, row_id: &str, following_id: &str)
    -> Result<(), AppError>;

    /// Case-insensitive substring search over username and display name.
    async fn search_profiles(
        &self,
        query: &str,
        exclude_user_id: &str,
        limit: usize,
    ) -> Result<Vec<Profile>, AppError>;

    /// Insert a batch of recommendations. Either every row is stored or
    /// none is.
    async fn insert_recommendations(
        &self,
        recommendations: &[NewRecommendation],
    ) -> Result<(), AppError>;

    /// Recommendations received by `recipient_id`, newest first.
    async fn list_recommendations(
        &self,
        recipient_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>, AppError>;

    /// Returns `false` when no matching row exists for this recipient.
    async fn mark_recommendation_read(&self, id: &str, recipient_id: &str)
    -> Result<bool, AppError>;
}
