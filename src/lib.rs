//! CineCircle social sync service
//!
//! Keeps the signed-in user's follow graph in sync with the hosted
//! backend and exposes it to the UI shell over a local HTTP API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Session hand-off                                         │
//! │  - Social graph / follow button / requests                  │
//! │  - Profile search, recommendations                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - SocialStore (TTL-cached follow graph)                    │
//! │  - RecommendationService                                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Hosted PostgREST API (reqwest)                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Social store and recommendations
//! - `session`: Signed-in user context
//! - `data`: Backend trait, models, SQLite and REST implementations
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus metrics

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod session;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Signed-in user
    pub session: Arc<session::SessionContext>,

    /// Relational store (SQLite or hosted)
    pub backend: Arc<dyn data::SocialBackend>,

    /// Follow graph store
    pub social: Arc<service::SocialStore>,

    /// Recommendation service
    pub recommendations: Arc<service::RecommendationService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Restore the configured session, if any
    /// 2. Connect to the configured backend
    /// 3. Build the services
    ///
    /// # Errors
    /// Returns error if the backend cannot be initialized
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let session = Arc::new(match &config.session {
            Some(configured) => session::SessionContext::with_session(session::Session::new(
                configured.user_id.trim(),
                configured.access_token.clone(),
            )),
            None => session::SessionContext::new(),
        });

        let backend: Arc<dyn data::SocialBackend> = match config.backend.mode {
            config::BackendMode::Sqlite => {
                let db = data::Database::connect(&config.backend.database.path).await?;
                tracing::info!(path = %config.backend.database.path.display(), "Database connected");
                Arc::new(db)
            }
            config::BackendMode::Rest => {
                let rest = data::RestBackend::new(&config.backend.rest, session.clone())?;
                tracing::info!("Hosted backend client initialized");
                Arc::new(rest)
            }
        };

        let state = Self::with_backend(config, session, backend);
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Build state around an already constructed backend
    pub fn with_backend(
        config: config::AppConfig,
        session: Arc<session::SessionContext>,
        backend: Arc<dyn data::SocialBackend>,
    ) -> Self {
        let social = Arc::new(service::SocialStore::new(
            backend.clone(),
            session.clone(),
            config.social.cache_ttl(),
        ));
        let recommendations = Arc::new(service::RecommendationService::new(
            backend.clone(),
            session.clone(),
            social.clone(),
        ));

        Self {
            config: Arc::new(config),
            session,
            backend,
            social,
            recommendations,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api::api_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if server.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check() -> &'static str {
    "OK"
}
