//! Integration tests for changegate
//!
//! These tests drive the Freshservice client through the shared scheduler
//! against a local mock server.

use std::time::Duration;

use changegate::api::{ApiError, FreshserviceClient};
use changegate::change::{ChangeDraft, ChangeType, Selection};
use changegate::risk::{QUESTIONS, RiskAssessment};
use changegate::scheduler::{RequestScheduler, SchedulerConfig};
use changegate::search::UserKind;
use mockito::{Matcher, Server, ServerGuard};

/// base64("test-key:X")
const BASIC_AUTH: &str = "Basic dGVzdC1rZXk6WA==";

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        pacing_delay_ms: 10,
        reset_buffer_ms: 10,
        ..Default::default()
    }
}

async fn client_for(server: &ServerGuard, config: SchedulerConfig) -> FreshserviceClient {
    let scheduler = RequestScheduler::spawn(config);
    FreshserviceClient::new(server.url(), "test-key", Duration::from_secs(5), scheduler).expect("client")
}

// =============================================================================
// Search Tests
// =============================================================================

#[tokio::test]
async fn test_agent_search_reads_users_and_quota() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v2/agents")
        .match_query(Matcher::UrlEncoded(
            "query".into(),
            "\"~[first_name|last_name|email]:'ada'\"".into(),
        ))
        .match_header("authorization", BASIC_AUTH)
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-ratelimit-total", "120")
        .with_header("x-ratelimit-remaining", "119")
        .with_header("x-ratelimit-reset", "4102444800")
        .with_body(r#"{"agents": [{"id": 1, "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"}]}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let users = client.search_users(UserKind::Agent, "ada").await.expect("search");

    mock.assert_async().await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].display_name(), "Ada Lovelace");

    let quota = client.scheduler().rate_limit_info();
    assert_eq!(quota.limit, 120);
    assert_eq!(quota.remaining, 119);
    assert_eq!(quota.reset_at, Some(4_102_444_800));
    assert_eq!(client.scheduler().queue_state().window.max_requests_per_window, 120);
}

#[tokio::test]
async fn test_requester_search_by_email() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v2/requesters")
        .match_query(Matcher::UrlEncoded("email".into(), "grace@example.com".into()))
        .with_status(200)
        .with_body(r#"{"requesters": [{"id": 9, "first_name": "Grace", "last_name": "Hopper", "primary_email": "grace@example.com"}]}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let users = client
        .search_users(UserKind::Requester, "grace@example.com")
        .await
        .expect("search");

    mock.assert_async().await;
    assert_eq!(users[0].email.as_deref(), Some("grace@example.com"));
}

#[tokio::test]
async fn test_bare_array_response() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v2/requesters")
        .match_query(Matcher::UrlEncoded("query".into(), "hopper".into()))
        .with_status(200)
        .with_body(r#"[{"id": 9, "first_name": "Grace"}, {"id": 10, "first_name": "Alan"}]"#)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let users = client.search_users(UserKind::Requester, "hopper").await.expect("search");
    assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![9, 10]);
}

#[tokio::test]
async fn test_list_groups() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v2/groups")
        .with_status(200)
        .with_body(r#"{"groups": [{"id": 5, "name": "Network"}, {"id": 6, "name": "DBA", "description": "Databases"}]}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let groups = client.list_groups().await.expect("groups");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1].description.as_deref(), Some("Databases"));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[tokio::test]
async fn test_http_error_propagates() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v2/groups")
        .with_status(401)
        .with_body(r#"{"message": "Invalid credentials"}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    match client.list_groups().await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("Invalid credentials"));
        }
        other => panic!("expected 401, got {:?}", other),
    }
    assert_eq!(client.scheduler().queue_state().stats.total_failed, 1);
}

#[tokio::test]
async fn test_rate_limited_request_is_retried_until_cap() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v2/groups")
        .with_status(429)
        .with_header("retry-after", "0")
        .expect(3)
        .create_async()
        .await;

    let config = SchedulerConfig {
        max_rate_limit_retries: Some(2),
        ..fast_config()
    };
    let client = client_for(&server, config).await;
    let result = client.list_groups().await;

    mock.assert_async().await;
    assert!(matches!(result, Err(ApiError::RateLimited { .. })));

    let stats = client.scheduler().queue_state().stats;
    assert_eq!(stats.total_rate_limited, 3);
    assert_eq!(stats.total_failed, 1);
}

// =============================================================================
// Scheduler End-to-End Tests
// =============================================================================

#[tokio::test]
async fn test_concurrent_callers_share_one_queue() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v2/agents")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"agents": []}"#)
        .expect(8)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.search_users(UserKind::Agent, &format!("user{}", i)).await })
        })
        .collect();

    for handle in handles {
        let users = handle.await.expect("join").expect("search");
        assert!(users.is_empty());
    }

    mock.assert_async().await;
    client.scheduler().wait_idle().await;
    let state = client.scheduler().queue_state();
    assert_eq!(state.stats.total_enqueued, 8);
    assert_eq!(state.stats.total_completed, 8);
    assert!(state.is_idle());
}

#[tokio::test]
async fn test_credentials_check_reports_quota() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v2/agents")
        .match_query(Matcher::UrlEncoded("per_page".into(), "1".into()))
        .with_status(200)
        .with_header("x-ratelimit-total", "40")
        .with_header("x-ratelimit-remaining", "12")
        .with_body(r#"{"agents": []}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let quota = client.test_credentials().await.expect("credentials");

    mock.assert_async().await;
    assert_eq!(quota.limit, 40);
    assert_eq!(quota.remaining, 12);
}

#[tokio::test]
async fn test_put_and_delete_share_the_queue() {
    let mut server = Server::new_async().await;
    let put = server
        .mock("PUT", "/api/v2/changes/77")
        .match_header("authorization", BASIC_AUTH)
        .match_body(Matcher::Json(serde_json::json!({"status": 2})))
        .with_status(200)
        .with_body(r#"{"change": {"id": 77, "status": 2}}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/api/v2/changes/77")
        .match_header("authorization", BASIC_AUTH)
        .with_status(204)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let update = client.put("/api/v2/changes/77", &serde_json::json!({"status": 2}));
    let remove = client.delete("/api/v2/changes/77");

    let (update, remove) = tokio::join!(update, remove);
    let update = update.expect("put");
    assert_eq!(update.json::<serde_json::Value>().unwrap()["change"]["status"], 2);
    assert_eq!(remove.expect("delete").status, 204);

    put.assert_async().await;
    delete.assert_async().await;
    let stats = client.scheduler().queue_state().stats;
    assert_eq!(stats.total_enqueued, 2);
    assert_eq!(stats.total_completed, 2);
}

// =============================================================================
// Change Submission Tests
// =============================================================================

#[tokio::test]
async fn test_submit_change_posts_payload() {
    let mut risk = RiskAssessment::new();
    for question in QUESTIONS.iter() {
        risk.answer(question.id, 3).unwrap();
    }
    let draft = ChangeDraft {
        title: "Replace core router".to_string(),
        change_type: Some(ChangeType::from_label("Non-Standard")),
        requester: Some(Selection::new(1, "Grace Hopper")),
        agent: Some(Selection::new(2, "Ada Lovelace")),
        group: Some(Selection::new(3, "Network")),
        risk,
    };
    let request = draft.validate().expect("valid draft");

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/changes")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(serde_json::json!({
            "subject": "Replace core router",
            "type": "non-standard",
            "requester_id": 1,
            "agent_id": 2,
            "group_id": 3,
            "risk_score": 15,
            "risk_level": "High",
        })))
        .with_status(201)
        .with_body(r#"{"change": {"id": 77}}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast_config()).await;
    let created = client.submit_change(&request).await.expect("submit");

    mock.assert_async().await;
    assert_eq!(created["change"]["id"], 77);
}
