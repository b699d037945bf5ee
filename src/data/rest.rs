//! Hosted backend client
//!
//! Talks to a PostgREST-compatible API (`/rest/v1/<table>`) with row
//! filters (`eq.`, `neq.`, `or=(...)`) and embedded `profiles` resources.
//! Requests carry the project `apikey` and the signed-in user's bearer
//! token so row-level security applies server-side.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};

use super::backend::SocialBackend;
use super::models::{FollowRow, FollowRowStatus, NewRecommendation, Profile, Recommendation};
use crate::config::RestBackendConfig;
use crate::error::AppError;
use crate::metrics::observe_backend;
use crate::session::SessionContext;

const BACKEND_NAME: &str = "rest";

const PROFILE_COLUMNS: &str = "user_id,username,display_name,avatar_url,points";

/// Maximum number of bytes of an error body kept in the error message
const MAX_ERROR_BODY: usize = 512;

fn relationship_select() -> String {
    format!(
        "id,follower_id,following_id,status,created_at,\
         follower_profile:profiles!follows_follower_id_fkey({PROFILE_COLUMNS}),\
         following_profile:profiles!follows_following_id_fkey({PROFILE_COLUMNS})"
    )
}

fn recommendation_select() -> String {
    format!(
        "id,sender_id,recipient_id,media_id,media_type,title,message,is_read,created_at,\
         sender_profile:profiles!recommendations_sender_id_fkey({PROFILE_COLUMNS})"
    )
}

/// Quote a value for use inside a PostgREST filter so reserved
/// characters (`,` `.` `(` `)`) cannot change the filter's meaning.
fn quote_filter_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn eq(value: &str) -> String {
    format!("eq.{}", quote_filter_value(value))
}

/// `or` filter matching rows where the user is on either side.
fn touching_user_filter(user_id: &str) -> String {
    let quoted = quote_filter_value(user_id);
    format!("(follower_id.eq.{quoted},following_id.eq.{quoted})")
}

/// `or` filter for a case-insensitive substring search.
fn profile_search_filter(query: &str) -> String {
    let mut literal = String::with_capacity(query.len());
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '*') {
            literal.push('\\');
        }
        literal.push(ch);
    }
    let pattern = quote_filter_value(&format!("*{literal}*"));
    format!("(username.ilike.{pattern},display_name.ilike.{pattern})")
}

/// REST backend
pub struct RestBackend {
    http_client: reqwest::Client,
    /// Base project URL without trailing slash
    base_url: String,
    api_key: String,
    session: Arc<SessionContext>,
}

impl RestBackend {
    /// Create a client for the hosted backend
    ///
    /// # Errors
    /// Returns error if url/api key are missing or the HTTP client cannot be built
    pub fn new(config: &RestBackendConfig, session: Arc<SessionContext>) -> Result<Self, AppError> {
        let base_url = config
            .url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::Config("backend.rest.url is required".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::Config("backend.rest.api_key is required".to_string()))?;

        let http_client = reqwest::Client::builder()
            .user_agent("CineCircle/0.1.0")
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
            session,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Build an authenticated request against a table
    async fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self
            .session
            .access_token()
            .await
            .unwrap_or_else(|| self.api_key.clone());

        self.http_client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    /// Send and map non-success statuses to [`AppError::Backend`]
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        tracing::warn!(operation, %status, body = %body, "Backend request rejected");

        Err(AppError::Backend(format!(
            "{operation} failed with status {status}"
        )))
    }
}

#[async_trait]
impl SocialBackend for RestBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn fetch_relationships(&self, user_id: &str) -> Result<Vec<FollowRow>, AppError> {
        observe_backend(BACKEND_NAME, "fetch_relationships", async {
            let request = self.request(Method::GET, "follows").await.query(&[
                ("select", relationship_select()),
                ("or", touching_user_filter(user_id)),
            ]);
            let rows = self
                .send("fetch_relationships", request)
                .await?
                .json::<Vec<FollowRow>>()
                .await?;
            Ok(rows)
        })
        .await
    }

    async fn insert_follow(&self, follower_id: &str, following_id: &str) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "insert_follow", async {
            let request = self
                .request(Method::POST, "follows")
                .await
                .header("Prefer", "return=minimal")
                .json(&serde_json::json!({
                    "follower_id": follower_id,
                    "following_id": following_id,
                    "status": FollowRowStatus::Pending.as_str(),
                }));
            self.send("insert_follow", request).await?;
            Ok(())
        })
        .await
    }

    async fn delete_follow(&self, follower_id: &str, following_id: &str) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "delete_follow", async {
            let request = self.request(Method::DELETE, "follows").await.query(&[
                ("follower_id", eq(follower_id)),
                ("following_id", eq(following_id)),
            ]);
            self.send("delete_follow", request).await?;
            Ok(())
        })
        .await
    }

    async fn accept_follow(&self, row_id: &str, following_id: &str) -> Result<bool, AppError> {
        observe_backend(BACKEND_NAME, "accept_follow", async {
            let request = self
                .request(Method::PATCH, "follows")
                .await
                .query(&[
                    ("id", eq(row_id)),
                    ("following_id", eq(following_id)),
                    ("select", "id".to_string()),
                ])
                .header("Prefer", "return=representation")
                .json(&serde_json::json!({ "status": FollowRowStatus::Accepted.as_str() }));
            let updated = self
                .send("accept_follow", request)
                .await?
                .json::<Vec<serde_json::Value>>()
                .await?;
            Ok(!updated.is_empty())
        })
        .await
    }

    async fn delete_follow_request(
        &self,
        row_id: &str,
        following_id: &str,
    ) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "delete_follow_request", async {
            let request = self
                .request(Method::DELETE, "follows")
                .await
                .query(&[("id", eq(row_id)), ("following_id", eq(following_id))]);
            self.send("delete_follow_request", request).await?;
            Ok(())
        })
        .await
    }

    async fn search_profiles(
        &self,
        query: &str,
        exclude_user_id: &str,
        limit: usize,
    ) -> Result<Vec<Profile>, AppError> {
        observe_backend(BACKEND_NAME, "search_profiles", async {
            let request = self.request(Method::GET, "profiles").await.query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("or", profile_search_filter(query)),
                ("user_id", format!("neq.{}", quote_filter_value(exclude_user_id))),
                ("order", "username.asc".to_string()),
                ("limit", limit.to_string()),
            ]);
            let profiles = self
                .send("search_profiles", request)
                .await?
                .json::<Vec<Profile>>()
                .await?;
            Ok(profiles)
        })
        .await
    }

    async fn insert_recommendations(
        &self,
        recommendations: &[NewRecommendation],
    ) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "insert_recommendations", async {
            // An array body is inserted as one statement.
            let request = self
                .request(Method::POST, "recommendations")
                .await
                .header("Prefer", "return=minimal")
                .json(recommendations);
            self.send("insert_recommendations", request).await?;
            Ok(())
        })
        .await
    }

    async fn list_recommendations(
        &self,
        recipient_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>, AppError> {
        observe_backend(BACKEND_NAME, "list_recommendations", async {
            let request = self.request(Method::GET, "recommendations").await.query(&[
                ("select", recommendation_select()),
                ("recipient_id", eq(recipient_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ]);
            let recommendations = self
                .send("list_recommendations", request)
                .await?
                .json::<Vec<Recommendation>>()
                .await?;
            Ok(recommendations)
        })
        .await
    }

    async fn mark_recommendation_read(
        &self,
        id: &str,
        recipient_id: &str,
    ) -> Result<bool, AppError> {
        observe_backend(BACKEND_NAME, "mark_recommendation_read", async {
            let request = self
                .request(Method::PATCH, "recommendations")
                .await
                .query(&[
                    ("id", eq(id)),
                    ("recipient_id", eq(recipient_id)),
                    ("select", "id".to_string()),
                ])
                .header("Prefer", "return=representation")
                .json(&serde_json::json!({ "is_read": true }));
            let updated = self
                .send("mark_recommendation_read", request)
                .await?
                .json::<Vec<serde_json::Value>>()
                .await?;
            Ok(!updated.is_empty())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use axum::extract::{RawQuery, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        query: Option<String>,
        apikey: Option<String>,
        authorization: Option<String>,
        body: Option<serde_json::Value>,
    }

    type Log = Arc<Mutex<Vec<Captured>>>;

    fn header(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
    }

    async fn list_follows(
        State(log): State<Log>,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
    ) -> Json<serde_json::Value> {
        log.lock().unwrap().push(Captured {
            method: "GET".to_string(),
            query,
            apikey: header(&headers, "apikey"),
            authorization: header(&headers, "authorization"),
            body: None,
        });
        Json(serde_json::json!([{
            "id": "row-1",
            "follower_id": "u1",
            "following_id": "u2",
            "status": "accepted",
            "created_at": "2024-05-01T10:00:00+00:00",
            "follower_profile": null,
            "following_profile": {
                "user_id": "u2",
                "username": "bob",
                "display_name": null,
                "avatar_url": null,
                "points": 3
            }
        }]))
    }

    async fn insert_follow(
        State(log): State<Log>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        log.lock().unwrap().push(Captured {
            method: "POST".to_string(),
            query: None,
            apikey: header(&headers, "apikey"),
            authorization: header(&headers, "authorization"),
            body: Some(body),
        });
        StatusCode::CREATED
    }

    async fn delete_follow() -> (StatusCode, &'static str) {
        (StatusCode::CONFLICT, "{\"message\":\"violates policy\"}")
    }

    /// Only `row-1` exists; any other id updates nothing.
    async fn patch_follow(
        State(log): State<Log>,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        let matched = query
            .as_deref()
            .is_some_and(|query| query.contains("row-1"));
        log.lock().unwrap().push(Captured {
            method: "PATCH".to_string(),
            query,
            apikey: header(&headers, "apikey"),
            authorization: header(&headers, "authorization"),
            body: Some(body),
        });
        if matched {
            Json(serde_json::json!([{ "id": "row-1" }]))
        } else {
            Json(serde_json::json!([]))
        }
    }

    async fn insert_recommendations(
        State(log): State<Log>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        log.lock().unwrap().push(Captured {
            method: "POST".to_string(),
            query: None,
            apikey: header(&headers, "apikey"),
            authorization: header(&headers, "authorization"),
            body: Some(body),
        });
        StatusCode::CREATED
    }

    async fn spawn_backend(log: Log) -> String {
        let app = Router::new()
            .route(
                "/rest/v1/follows",
                get(list_follows)
                    .post(insert_follow)
                    .patch(patch_follow)
                    .delete(delete_follow),
            )
            .route("/rest/v1/recommendations", post(insert_recommendations))
            .with_state(log);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn make_backend(url: String, session: Arc<SessionContext>) -> RestBackend {
        let config = RestBackendConfig {
            url: Some(format!("{url}/")),
            api_key: Some("anon-key".to_string()),
            timeout_seconds: 5,
        };
        RestBackend::new(&config, session).unwrap()
    }

    #[test]
    fn filter_values_are_quoted() {
        assert_eq!(eq("u1"), "eq.\"u1\"");
        assert_eq!(
            touching_user_filter("a,b"),
            "(follower_id.eq.\"a,b\",following_id.eq.\"a,b\")"
        );
        assert_eq!(quote_filter_value("x\"y"), "\"x\\\"y\"");
        assert_eq!(
            profile_search_filter("bo_b"),
            "(username.ilike.\"*bo\\\\_b*\",display_name.ilike.\"*bo\\\\_b*\")"
        );
    }

    #[test]
    fn new_requires_url_and_key() {
        let session = Arc::new(SessionContext::new());
        let missing = RestBackendConfig::default();
        assert!(matches!(
            RestBackend::new(&missing, session),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn fetch_relationships_sends_or_filter_and_parses_rows() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_backend(log.clone()).await;
        let session = Arc::new(SessionContext::new());
        let backend = make_backend(url, session);

        let rows = backend.fetch_relationships("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, FollowRowStatus::Accepted);
        assert_eq!(rows[0].following_profile.as_ref().unwrap().username, "bob");

        let captured = log.lock().unwrap()[0].clone();
        assert_eq!(captured.method, "GET");
        let query = captured.query.unwrap();
        assert!(query.contains("or="));
        assert!(query.contains("follower_id.eq"));
        assert_eq!(captured.apikey.as_deref(), Some("anon-key"));
        // Without a session the anon key doubles as bearer.
        assert_eq!(captured.authorization.as_deref(), Some("Bearer anon-key"));
    }

    #[tokio::test]
    async fn insert_follow_posts_pending_row_with_session_token() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_backend(log.clone()).await;
        let session = Arc::new(SessionContext::with_session(Session::new(
            "u1",
            Some("user-token".to_string()),
        )));
        let backend = make_backend(url, session);

        backend.insert_follow("u1", "u2").await.unwrap();

        let captured = log.lock().unwrap()[0].clone();
        assert_eq!(captured.method, "POST");
        assert_eq!(captured.authorization.as_deref(), Some("Bearer user-token"));
        let body = captured.body.unwrap();
        assert_eq!(body["follower_id"], "u1");
        assert_eq!(body["following_id"], "u2");
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn rejected_request_maps_to_backend_error() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_backend(log).await;
        let backend = make_backend(url, Arc::new(SessionContext::new()));

        let error = backend.delete_follow("u1", "u2").await.unwrap_err();
        assert!(matches!(
            error,
            AppError::Backend(message) if message.contains("409")
        ));
    }

    #[tokio::test]
    async fn accept_follow_reports_whether_a_row_changed() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_backend(log.clone()).await;
        let backend = make_backend(url, Arc::new(SessionContext::new()));

        assert!(backend.accept_follow("row-1", "u2").await.unwrap());
        assert!(!backend.accept_follow("stale-row", "u2").await.unwrap());

        let captured = log.lock().unwrap()[0].clone();
        assert_eq!(captured.method, "PATCH");
        let query = captured.query.unwrap();
        assert!(query.contains("following_id=eq"));
        assert!(query.contains("select=id"));
        assert_eq!(captured.body.unwrap()["status"], "accepted");
    }

    #[tokio::test]
    async fn insert_recommendations_posts_one_array() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_backend(log.clone()).await;
        let backend = make_backend(url, Arc::new(SessionContext::new()));

        let rows: Vec<NewRecommendation> = ["u2", "u3"]
            .into_iter()
            .map(|recipient| NewRecommendation {
                id: format!("rec-{recipient}"),
                sender_id: "u1".to_string(),
                recipient_id: recipient.to_string(),
                media_id: 603,
                media_type: crate::data::MediaType::Movie,
                title: "The Matrix".to_string(),
                message: None,
                created_at: chrono::Utc::now(),
            })
            .collect();
        backend.insert_recommendations(&rows).await.unwrap();

        let captured = log.lock().unwrap().clone();
        assert_eq!(captured.len(), 1);
        let body = captured[0].body.clone().unwrap();
        let inserted = body.as_array().unwrap();
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[1]["recipient_id"], "u3");
        assert_eq!(inserted[0]["media_type"], "movie");
    }
}
