//! Session context
//!
//! The signed-in user, shared by the services and the REST backend.
//! Services read it on every call instead of capturing a user id, so
//! signing out or switching users takes effect immediately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Authenticated user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend user id (matches `profiles.user_id`)
    pub user_id: String,
    /// Bearer token for the hosted backend
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    /// When this session was established
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token,
            signed_in_at: Utc::now(),
        }
    }
}

/// Holder for the current session
#[derive(Debug, Default)]
pub struct SessionContext {
    current: RwLock<Option<Session>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that starts signed in
    pub fn with_session(session: Session) -> Self {
        Self {
            current: RwLock::new(Some(session)),
        }
    }

    /// Replace the current session, returning the previous one
    pub async fn sign_in(&self, session: Session) -> Option<Session> {
        tracing::info!(user_id = %session.user_id, "Session started");
        self.current.write().await.replace(session)
    }

    /// Clear the current session, returning it if one existed
    pub async fn sign_out(&self) -> Option<Session> {
        let previous = self.current.write().await.take();
        if let Some(session) = &previous {
            tracing::info!(user_id = %session.user_id, "Session ended");
        }
        previous
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.user_id.clone())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .and_then(|session| session.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_and_out_replace_session() {
        let context = SessionContext::new();
        assert!(context.user_id().await.is_none());

        assert!(context.sign_in(Session::new("u1", None)).await.is_none());
        let previous = context
            .sign_in(Session::new("u2", Some("token".to_string())))
            .await;
        assert_eq!(previous.unwrap().user_id, "u1");
        assert_eq!(context.user_id().await.as_deref(), Some("u2"));
        assert_eq!(context.access_token().await.as_deref(), Some("token"));

        assert_eq!(context.sign_out().await.unwrap().user_id, "u2");
        assert!(context.current().await.is_none());
        assert!(context.sign_out().await.is_none());
    }

    #[test]
    fn access_token_is_not_serialized() {
        let session = Session::new("u1", Some("secret".to_string()));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert!(json.get("access_token").is_none());
    }
}
