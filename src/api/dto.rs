//! API request and response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{FollowStatus, MediaType};
use crate::service::FetchOutcome;

/// POST /api/v1/session
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub user_id: String,
    pub access_token: Option<String>,
}

/// Current session as exposed to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Query for GET /api/v1/social
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchParams {
    #[serde(default)]
    pub force: bool,
}

/// Result of a fetch plus the resulting snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SocialResponse {
    pub outcome: FetchOutcome,
    #[serde(flatten)]
    pub snapshot: crate::service::SocialSnapshot,
}

/// Follow button state for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipResponse {
    pub user_id: String,
    pub status: FollowStatus,
}

/// POST /api/v1/social/requests/:id/accept
#[derive(Debug, Clone, Deserialize)]
pub struct AcceptRequestBody {
    pub follower_id: String,
}

/// Result of accepting or declining a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestActionResponse {
    pub id: String,
    pub accepted: bool,
}

/// Query for GET /api/v1/profiles/search
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

/// POST /api/v1/recommendations
#[derive(Debug, Clone, Deserialize)]
pub struct SendRecommendationRequest {
    pub recipient_ids: Vec<String>,
    pub media_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub message: Option<String>,
}

/// Response for a sent recommendation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRecommendationResponse {
    pub ids: Vec<String>,
    pub recipients: Vec<String>,
}

/// Query for GET /api/v1/recommendations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxParams {
    pub limit: Option<usize>,
}
