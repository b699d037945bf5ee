//! E2E tests for recommendations

mod common;

use cinecircle::data::SocialBackend;
use common::TestServer;
use serde_json::{Value, json};

fn matrix_for(recipients: &[&str]) -> Value {
    json!({
        "recipient_ids": recipients,
        "media_id": 603,
        "media_type": "movie",
        "title": "The Matrix",
        "message": "you have to see this"
    })
}

#[tokio::test]
async fn test_send_and_read_recommendation() {
    let server = TestServer::new().await;
    server.seed_users().await;
    server.create_accepted_follow("u1", "u2").await;

    server.sign_in("u1").await;
    let response = server
        .client
        .post(server.url("/api/v1/recommendations"))
        .json(&matrix_for(&["u2", "u2"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["recipients"], json!(["u2"]));

    server.sign_in("u2").await;
    let inbox: Value = server
        .client
        .get(server.url("/api/v1/recommendations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["title"], "The Matrix");
    assert_eq!(inbox[0]["media_type"], "movie");
    assert_eq!(inbox[0]["sender_profile"]["username"], "alice");
    assert_eq!(inbox[0]["is_read"], false);

    let id = inbox[0]["id"].as_str().unwrap();
    let response = server
        .client
        .post(server.url(&format!("/api/v1/recommendations/{}/read", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = server
        .client
        .post(server.url("/api/v1/recommendations/missing/read"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_recommendation_requires_following_recipient() {
    let server = TestServer::new().await;
    server.seed_users().await;
    server.create_accepted_follow("u1", "u2").await;
    // A pending request is not enough.
    server.db.insert_follow("u1", "u3").await.unwrap();

    server.sign_in("u1").await;
    let response = server
        .client
        .post(server.url("/api/v1/recommendations"))
        .json(&matrix_for(&["u2", "u3"]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("u3"));
}

#[tokio::test]
async fn test_recommendation_requires_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/api/v1/recommendations"))
        .json(&matrix_for(&["u2"]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}
