//! Common test utilities for E2E tests

use std::path::PathBuf;
use std::sync::Arc;

use cinecircle::data::{Database, Profile, SocialBackend};
use cinecircle::session::SessionContext;
use cinecircle::{AppState, config};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub db: Arc<Database>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance backed by a fresh SQLite file
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = test_config(db_path.clone());

        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let backend: Arc<dyn SocialBackend> = db.clone();
        let state = AppState::with_backend(config, Arc::new(SessionContext::new()), backend);

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = cinecircle::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            db,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Insert a profile row
    pub async fn create_profile(&self, user_id: &str, username: &str) -> Profile {
        let profile = Profile {
            user_id: user_id.to_string(),
            username: username.to_string(),
            display_name: Some(format!("{} display", username)),
            avatar_url: None,
            points: 0,
        };
        self.db.upsert_profile(&profile).await.unwrap();
        profile
    }

    /// Seed alice (u1), bob (u2) and carol (u3)
    pub async fn seed_users(&self) {
        self.create_profile("u1", "alice").await;
        self.create_profile("u2", "bob").await;
        self.create_profile("u3", "carol").await;
    }

    /// Sign in through the API
    pub async fn sign_in(&self, user_id: &str) {
        let response = self
            .client
            .post(self.url("/api/v1/session"))
            .json(&json!({ "user_id": user_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    /// Fetch the social snapshot, optionally forcing a refetch
    pub async fn social(&self, force: bool) -> serde_json::Value {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/social?force={}", force)))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    /// Follow a user through the API, returning the response status
    pub async fn follow(&self, user_id: &str) -> reqwest::StatusCode {
        self.client
            .post(self.url(&format!("/api/v1/social/follow/{}", user_id)))
            .send()
            .await
            .unwrap()
            .status()
    }

    /// Make `follower` an accepted follower of `following` directly in the database
    pub async fn create_accepted_follow(&self, follower: &str, following: &str) {
        self.db.insert_follow(follower, following).await.unwrap();
        let row = self.db.get_follow(follower, following).await.unwrap().unwrap();
        assert!(self.db.accept_follow(&row.id, following).await.unwrap());
    }
}

fn test_config(db_path: PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            allowed_origins: Vec::new(),
        },
        backend: config::BackendConfig {
            mode: config::BackendMode::Sqlite,
            database: config::DatabaseConfig { path: db_path },
            rest: config::RestBackendConfig::default(),
        },
        social: config::SocialConfig {
            cache_ttl_seconds: 60,
        },
        session: None,
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
