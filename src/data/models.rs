//! Data models
//!
//! Rust structs representing backend rows and the derived social view.
//! Locally generated IDs use ULID; timestamps use chrono.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// Public projection of a user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub points: i64,
}

impl Profile {
    /// Stand-in used when the backend returns a row without its joined profile.
    pub fn placeholder(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: user_id.to_string(),
            display_name: None,
            avatar_url: None,
            points: 0,
        }
    }
}

// =============================================================================
// Follow relationships
// =============================================================================

/// Stored status of a follow row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowRowStatus {
    Pending,
    Accepted,
}

impl FollowRowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            _ => None,
        }
    }
}

/// Directed edge in the follow graph, joined with both profiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRow {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub status: FollowRowStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub follower_profile: Option<Profile>,
    #[serde(default)]
    pub following_profile: Option<Profile>,
}

/// Which end of a follow row the signed-in user occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Current user sent the follow
    Follower,
    /// Current user received the follow
    Followee,
}

/// Derive the current user's role in a row.
///
/// Returns `None` for rows that do not involve `self_id`. A row where the
/// user follows themself resolves to `Follower`.
pub fn role_of(row: &FollowRow, self_id: &str) -> Option<Role> {
    if row.follower_id == self_id {
        Some(Role::Follower)
    } else if row.following_id == self_id {
        Some(Role::Followee)
    } else {
        None
    }
}

/// Relationship between the signed-in user and another user, as seen
/// from the follow button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    None,
    Pending,
    Accepted,
}

/// Incoming follow request awaiting accept/decline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Follow row id, needed to accept or decline
    pub id: String,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Recommendations
// =============================================================================

/// Kind of title being recommended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(Self::Movie),
            "tv" => Some(Self::Tv),
            _ => None,
        }
    }
}

/// A title one user recommended to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    /// Metadata provider id of the movie or show
    pub media_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub message: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sender_profile: Option<Profile>,
}

/// Recommendation row to insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRecommendation {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub media_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(follower: &str, following: &str) -> FollowRow {
        FollowRow {
            id: EntityId::new().0,
            follower_id: follower.to_string(),
            following_id: following.to_string(),
            status: FollowRowStatus::Pending,
            created_at: Utc::now(),
            follower_profile: None,
            following_profile: None,
        }
    }

    #[test]
    fn role_of_detects_each_side() {
        assert_eq!(role_of(&row("u1", "u2"), "u1"), Some(Role::Follower));
        assert_eq!(role_of(&row("u1", "u2"), "u2"), Some(Role::Followee));
        assert_eq!(role_of(&row("u1", "u2"), "u3"), None);
        assert_eq!(role_of(&row("u1", "u1"), "u1"), Some(Role::Follower));
    }

    #[test]
    fn follow_row_deserializes_rest_payload() {
        let payload = serde_json::json!({
            "id": "row-1",
            "follower_id": "u1",
            "following_id": "u2",
            "status": "accepted",
            "created_at": "2024-05-01T10:00:00+00:00",
            "follower_profile": null,
            "following_profile": {
                "user_id": "u2",
                "username": "bob",
                "display_name": "Bob",
                "avatar_url": null,
                "points": 12
            }
        });

        let row: FollowRow = serde_json::from_value(payload).unwrap();
        assert_eq!(row.status, FollowRowStatus::Accepted);
        assert!(row.follower_profile.is_none());
        assert_eq!(row.following_profile.unwrap().points, 12);
    }

    #[test]
    fn status_strings_round_trip_through_parse() {
        assert_eq!(FollowRowStatus::parse("pending"), Some(FollowRowStatus::Pending));
        assert_eq!(FollowRowStatus::parse("blocked"), None);
        assert_eq!(MediaType::parse(MediaType::Tv.as_str()), Some(MediaType::Tv));
    }
}
