//! Social graph store
//!
//! Client-side cache of the signed-in user's follow graph. Rows touching
//! the user are fetched in one query and partitioned into four views:
//!
//! | role     | status   | view                   |
//! |----------|----------|------------------------|
//! | follower | accepted | `following`            |
//! | followee | accepted | `followers`            |
//! | followee | pending  | `pending_incoming`     |
//! | follower | pending  | `pending_outgoing_ids` |
//!
//! Mutations go to the backend first; the local views change only after
//! the backend confirms. A failed mutation leaves the views untouched and
//! reports `false`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::data::{
    FollowRow, FollowRowStatus, FollowStatus, PendingRequest, Profile, Role, SocialBackend,
    role_of,
};
use crate::error::AppError;
use crate::metrics::{
    SOCIAL_CACHE_HITS_TOTAL, SOCIAL_CACHE_MISSES_TOTAL, SOCIAL_GRAPH_SIZE, SOCIAL_MUTATIONS_TOTAL,
};
use crate::session::SessionContext;

/// Default reuse window for fetched follow data
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// The four views derived from a set of follow rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowGraph {
    pub following: Vec<Profile>,
    pub followers: Vec<Profile>,
    pub pending_incoming: Vec<PendingRequest>,
    pub pending_outgoing_ids: BTreeSet<String>,
}

impl FollowGraph {
    /// Total number of entries across all four views
    pub fn len(&self) -> usize {
        self.following.len()
            + self.followers.len()
            + self.pending_incoming.len()
            + self.pending_outgoing_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition rows by the current user's role and the row status.
///
/// Each row touching `self_id` lands in exactly one view. Missing joined
/// profiles are replaced by [`Profile::placeholder`].
pub fn partition_rows(rows: Vec<FollowRow>, self_id: &str) -> FollowGraph {
    let mut graph = FollowGraph::default();

    for row in rows {
        let Some(role) = role_of(&row, self_id) else {
            tracing::debug!(row_id = %row.id, "Ignoring follow row that does not involve the user");
            continue;
        };

        match (role, row.status) {
            (Role::Follower, FollowRowStatus::Accepted) => {
                let profile = row
                    .following_profile
                    .unwrap_or_else(|| Profile::placeholder(&row.following_id));
                graph.following.push(profile);
            }
            (Role::Followee, FollowRowStatus::Accepted) => {
                let profile = row
                    .follower_profile
                    .unwrap_or_else(|| Profile::placeholder(&row.follower_id));
                graph.followers.push(profile);
            }
            (Role::Followee, FollowRowStatus::Pending) => {
                let profile = row
                    .follower_profile
                    .unwrap_or_else(|| Profile::placeholder(&row.follower_id));
                graph.pending_incoming.push(PendingRequest {
                    id: row.id,
                    profile,
                    created_at: row.created_at,
                });
            }
            (Role::Follower, FollowRowStatus::Pending) => {
                graph.pending_outgoing_ids.insert(row.following_id);
            }
        }
    }

    graph
}

/// What a call to [`SocialStore::fetch_follow_data`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Nobody is signed in
    NoSession,
    /// Cached data is younger than the TTL
    Fresh,
    /// Data was fetched and replaced
    Fetched,
    /// The backend query failed; previous data kept
    Failed,
}

/// Serializable view of the store
#[derive(Debug, Clone, Serialize)]
pub struct SocialSnapshot {
    pub following: Vec<Profile>,
    pub followers: Vec<Profile>,
    pub pending_incoming: Vec<PendingRequest>,
    pub pending_outgoing_ids: Vec<String>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SocialState {
    graph: FollowGraph,
    /// Fetches currently waiting on the backend
    in_flight: usize,
    error: Option<String>,
    /// User the cached graph belongs to
    owner: Option<String>,
    fetched_at: Option<Instant>,
    last_fetched_at: Option<DateTime<Utc>>,
}

impl SocialState {
    fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    fn is_fresh_for(&self, user_id: &str, ttl: Duration) -> bool {
        self.owner.as_deref() == Some(user_id)
            && self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn record_sizes(&self) {
        SOCIAL_GRAPH_SIZE
            .with_label_values(&["following"])
            .set(self.graph.following.len() as i64);
        SOCIAL_GRAPH_SIZE
            .with_label_values(&["followers"])
            .set(self.graph.followers.len() as i64);
        SOCIAL_GRAPH_SIZE
            .with_label_values(&["pending_incoming"])
            .set(self.graph.pending_incoming.len() as i64);
        SOCIAL_GRAPH_SIZE
            .with_label_values(&["pending_outgoing"])
            .set(self.graph.pending_outgoing_ids.len() as i64);
    }
}

fn record_mutation(operation: &'static str, success: bool) -> bool {
    let outcome = if success { "ok" } else { "error" };
    SOCIAL_MUTATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    success
}

fn record_not_found(operation: &'static str) {
    SOCIAL_MUTATIONS_TOTAL
        .with_label_values(&[operation, "not_found"])
        .inc();
}

/// Social graph store
///
/// One instance per signed-in client. Locks are never held across a
/// backend call; two overlapping fetches both hit the backend and the
/// later write wins.
pub struct SocialStore {
    backend: Arc<dyn SocialBackend>,
    session: Arc<SessionContext>,
    cache_ttl: Duration,
    state: RwLock<SocialState>,
}

impl SocialStore {
    /// Create new social store
    ///
    /// # Arguments
    /// * `backend` - Relational store holding the `follows` table
    /// * `session` - Current session; read on every call
    /// * `cache_ttl` - How long fetched data is reused without `force`
    pub fn new(
        backend: Arc<dyn SocialBackend>,
        session: Arc<SessionContext>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            session,
            cache_ttl,
            state: RwLock::new(SocialState::default()),
        }
    }

    /// Refresh the follow graph from the backend
    ///
    /// No-op without a session, or when the cache is younger than the TTL
    /// and `force` is false. On failure the previous views are kept and
    /// the error message is recorded.
    pub async fn fetch_follow_data(&self, force: bool) -> FetchOutcome {
        let Some(user_id) = self.session.user_id().await else {
            return FetchOutcome::NoSession;
        };

        {
            let mut state = self.state.write().await;
            if !force && state.is_fresh_for(&user_id, self.cache_ttl) {
                SOCIAL_CACHE_HITS_TOTAL.inc();
                return FetchOutcome::Fresh;
            }
            state.in_flight += 1;
        }
        SOCIAL_CACHE_MISSES_TOTAL.inc();

        let result = self.backend.fetch_relationships(&user_id).await;
        let still_current = self.is_current_user(&user_id).await;

        let mut state = self.state.write().await;
        state.in_flight = state.in_flight.saturating_sub(1);

        if !still_current {
            tracing::info!(user_id = %user_id, "Session changed during fetch; discarding result");
            return FetchOutcome::Failed;
        }

        match result {
            Ok(rows) => {
                let row_count = rows.len();
                state.graph = partition_rows(rows, &user_id);
                state.owner = Some(user_id.clone());
                state.error = None;
                state.fetched_at = Some(Instant::now());
                state.last_fetched_at = Some(Utc::now());
                state.record_sizes();

                tracing::debug!(
                    user_id = %user_id,
                    rows = row_count,
                    following = state.graph.following.len(),
                    followers = state.graph.followers.len(),
                    pending_incoming = state.graph.pending_incoming.len(),
                    pending_outgoing = state.graph.pending_outgoing_ids.len(),
                    "Follow data refreshed"
                );
                FetchOutcome::Fetched
            }
            Err(error) => {
                tracing::warn!(user_id = %user_id, %error, "Failed to fetch follow data");
                state.error = Some(error.to_string());
                FetchOutcome::Failed
            }
        }
    }

    /// Send a follow request to `target_id`
    ///
    /// On success the target becomes pending in the outgoing set.
    pub async fn follow(&self, target_id: &str) -> bool {
        let Some(user_id) = self.session.user_id().await else {
            return false;
        };
        if target_id == user_id {
            tracing::warn!(user_id = %user_id, "Refusing to follow self");
            return record_mutation("follow", false);
        }

        if let Err(error) = self.backend.insert_follow(&user_id, target_id).await {
            tracing::warn!(target_id, %error, "Follow failed");
            return record_mutation("follow", false);
        }
        if !self.is_current_user(&user_id).await {
            tracing::info!(user_id = %user_id, "Session changed during follow; views left as is");
            return record_mutation("follow", true);
        }

        let mut state = self.state.write().await;
        state.graph.pending_outgoing_ids.insert(target_id.to_string());
        state.record_sizes();
        record_mutation("follow", true)
    }

    /// Remove the follow (accepted or pending) from the user to `target_id`
    pub async fn unfollow(&self, target_id: &str) -> bool {
        let Some(user_id) = self.session.user_id().await else {
            return false;
        };

        if let Err(error) = self.backend.delete_follow(&user_id, target_id).await {
            tracing::warn!(target_id, %error, "Unfollow failed");
            return record_mutation("unfollow", false);
        }
        if !self.is_current_user(&user_id).await {
            tracing::info!(user_id = %user_id, "Session changed during unfollow; views left as is");
            return record_mutation("unfollow", true);
        }

        let mut state = self.state.write().await;
        state
            .graph
            .following
            .retain(|profile| profile.user_id != target_id);
        state.graph.pending_outgoing_ids.remove(target_id);
        state.record_sizes();
        record_mutation("unfollow", true)
    }

    /// Accept an incoming follow request
    ///
    /// Returns `false` if the backend failed or no pending row with this id
    /// is addressed to the user.
    pub async fn accept_request(&self, row_id: &str, follower_user_id: &str) -> bool {
        matches!(
            self.try_accept_request(row_id, follower_user_id).await,
            Ok(true)
        )
    }

    /// Accept an incoming follow request, keeping the failure reason
    ///
    /// `Ok(false)` means the backend matched no row. On `Ok(true)` the
    /// cached request entry moves into `followers` with its profile; if
    /// the request was never cached the views are marked stale instead.
    ///
    /// # Errors
    /// `Unauthorized` without a session, backend errors otherwise
    pub async fn try_accept_request(
        &self,
        row_id: &str,
        follower_user_id: &str,
    ) -> Result<bool, AppError> {
        let user_id = self.session.user_id().await.ok_or(AppError::Unauthorized)?;

        let accepted = match self.backend.accept_follow(row_id, &user_id).await {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!(row_id, %error, "Accepting follow request failed");
                record_mutation("accept_request", false);
                return Err(error);
            }
        };
        if !accepted {
            tracing::info!(row_id, user_id = %user_id, "No follow request to accept");
            record_not_found("accept_request");
            return Ok(false);
        }
        if !self.is_current_user(&user_id).await {
            tracing::info!(user_id = %user_id, "Session changed during accept; views left as is");
            record_mutation("accept_request", true);
            return Ok(true);
        }

        let mut state = self.state.write().await;
        let position = state
            .graph
            .pending_incoming
            .iter()
            .position(|request| request.id == row_id);
        match position {
            Some(index) => {
                let request = state.graph.pending_incoming.remove(index);
                if request.profile.user_id != follower_user_id {
                    tracing::warn!(
                        row_id,
                        cached = %request.profile.user_id,
                        given = follower_user_id,
                        "Accepted request belongs to a different follower than given"
                    );
                }
                if !state
                    .graph
                    .followers
                    .iter()
                    .any(|existing| existing.user_id == request.profile.user_id)
                {
                    state.graph.followers.push(request.profile);
                }
            }
            None => {
                tracing::debug!(row_id, "Accepted request was not cached; marking views stale");
                state.fetched_at = None;
            }
        }
        state.record_sizes();
        record_mutation("accept_request", true);
        Ok(true)
    }

    /// Decline an incoming follow request
    pub async fn decline_request(&self, row_id: &str) -> bool {
        let Some(user_id) = self.session.user_id().await else {
            return false;
        };

        if let Err(error) = self.backend.delete_follow_request(row_id, &user_id).await {
            tracing::warn!(row_id, %error, "Declining follow request failed");
            return record_mutation("decline_request", false);
        }
        if !self.is_current_user(&user_id).await {
            tracing::info!(user_id = %user_id, "Session changed during decline; views left as is");
            return record_mutation("decline_request", true);
        }

        let mut state = self.state.write().await;
        state
            .graph
            .pending_incoming
            .retain(|request| request.id != row_id);
        state.record_sizes();
        record_mutation("decline_request", true)
    }

    /// Relationship from the user to `target_id`, from cached data only
    pub async fn get_follow_status(&self, target_id: &str) -> FollowStatus {
        let state = self.state.read().await;
        if state
            .graph
            .following
            .iter()
            .any(|profile| profile.user_id == target_id)
        {
            FollowStatus::Accepted
        } else if state.graph.pending_outgoing_ids.contains(target_id) {
            FollowStatus::Pending
        } else {
            FollowStatus::None
        }
    }

    /// Drop all cached data (used on sign-out / user switch)
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = SocialState::default();
        state.record_sizes();
    }

    pub async fn snapshot(&self) -> SocialSnapshot {
        let state = self.state.read().await;
        SocialSnapshot {
            following: state.graph.following.clone(),
            followers: state.graph.followers.clone(),
            pending_incoming: state.graph.pending_incoming.clone(),
            pending_outgoing_ids: state.graph.pending_outgoing_ids.iter().cloned().collect(),
            is_loading: state.is_loading(),
            error: state.error.clone(),
            last_fetched_at: state.last_fetched_at,
        }
    }

    pub async fn following(&self) -> Vec<Profile> {
        self.state.read().await.graph.following.clone()
    }

    pub async fn followers(&self) -> Vec<Profile> {
        self.state.read().await.graph.followers.clone()
    }

    pub async fn pending_incoming(&self) -> Vec<PendingRequest> {
        self.state.read().await.graph.pending_incoming.clone()
    }

    pub async fn pending_outgoing_ids(&self) -> BTreeSet<String> {
        self.state.read().await.graph.pending_outgoing_ids.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    async fn is_current_user(&self, user_id: &str) -> bool {
        self.session.user_id().await.as_deref() == Some(user_id)
    }

    /// Whether a non-forced fetch would be served from cache right now
    pub async fn is_fresh(&self) -> bool {
        let Some(user_id) = self.session.user_id().await else {
            return false;
        };
        self.state.read().await.is_fresh_for(&user_id, self.cache_ttl)
    }
}
