//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services own cached state and orchestrate backend calls.

mod recommendation;
mod social;

pub use recommendation::{MediaRef, RecommendationService};
pub use social::{
    DEFAULT_CACHE_TTL, FetchOutcome, FollowGraph, SocialSnapshot, SocialStore, partition_rows,
};
