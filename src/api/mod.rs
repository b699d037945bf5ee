//! API layer
//!
//! HTTP handlers for:
//! - Session hand-off from the UI shell
//! - Social graph (follow data, follow button, requests)
//! - Profile search
//! - Recommendations
//! - Metrics (Prometheus)

mod dto;
mod extract;
pub mod metrics;
mod profiles;
mod recommendations;
mod session;
mod social;

pub use dto::*;
pub use extract::CurrentUser;
pub use metrics::metrics_router;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::AppState;

/// Create the `/api/v1` router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            post(session::sign_in)
                .get(session::get_session)
                .delete(session::sign_out),
        )
        .route("/social", get(social::get_social))
        .route("/social/following", get(social::get_following))
        .route("/social/status/:user_id", get(social::get_follow_status))
        .route(
            "/social/follow/:user_id",
            post(social::follow_user).delete(social::unfollow_user),
        )
        .route(
            "/social/requests/:id/accept",
            post(social::accept_request),
        )
        .route(
            "/social/requests/:id/decline",
            post(social::decline_request),
        )
        .route("/profiles/search", get(profiles::search_profiles))
        .route(
            "/recommendations",
            post(recommendations::send_recommendation).get(recommendations::list_recommendations),
        )
        .route(
            "/recommendations/:id/read",
            post(recommendations::mark_recommendation_read),
        )
        .layer(middleware::from_fn(metrics::track_requests))
}
