//! REST client tests against a mock HTTP server.

use eduthread_client::{ApiClient, ClientConfig, ClientError, MessageApi};
use eduthread_core::{GuardianId, MessageId, PageRequest, TeacherId, ThreadId, UserRole};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> ApiClient {
    let config = ClientConfig::with_base_url(server.uri());
    ApiClient::new(&config, TOKEN).unwrap()
}

fn message(id: i64, sender: &str) -> Value {
    json!({
        "id": id,
        "threadId": 7,
        "senderUserId": sender,
        "content": format!("message {id}"),
        "sentAt": "2024-03-01T09:15:00Z",
        "isRead": false
    })
}

// =============================================================================
// Messages
// =============================================================================

#[tokio::test]
async fn fetch_newest_page_without_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/threads/7/messages"))
        .and(query_param("take", "30"))
        .and(query_param_is_missing("beforeId"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([message(9, "a"), message(8, "b")])))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .fetch_page(ThreadId::new(7), PageRequest { before: None, take: 30 })
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, MessageId::new(9));
}

#[tokio::test]
async fn fetch_older_page_passes_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/threads/7/messages"))
        .and(query_param("take", "10"))
        .and(query_param("beforeId", "41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([message(40, "a")])))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .fetch_page(
            ThreadId::new(7),
            PageRequest {
                before: Some(MessageId::new(41)),
                take: 10,
            },
        )
        .await
        .unwrap();

    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn send_message_posts_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/threads/7/messages"))
        .and(body_json(json!({ "content": "See you at the meeting" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(message(12, "me")))
        .expect(1)
        .mount(&server)
        .await;

    let sent = client(&server)
        .send_message(ThreadId::new(7), "See you at the meeting")
        .await
        .unwrap();
    assert_eq!(sent.id, MessageId::new(12));
}

#[tokio::test]
async fn mark_read_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/threads/7/messages/3"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/threads/7/messages/4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    api.mark_read(ThreadId::new(7), MessageId::new(3)).await.unwrap();
    api.delete_message(ThreadId::new(7), MessageId::new(4))
        .await
        .unwrap();
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn problem_details_become_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/threads/99/messages"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "title": "Not Found", "detail": "Thread 99 not found" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_page(ThreadId::new(99), PageRequest { before: None, take: 30 })
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    match err {
        ClientError::Api { message, .. } => assert_eq!(message, "Thread 99 not found"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn plain_text_error_body_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let err = client(&server).current_user().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(err.to_string(), "API error (401): token expired");
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).list_threads().await.unwrap_err();
    assert!(matches!(err, ClientError::Parse(_)));
}

// =============================================================================
// Threads and Account
// =============================================================================

#[tokio::test]
async fn thread_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/threads"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": 1, "teacherId": 2, "guardianId": 3 }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/threads"))
        .and(body_json(json!({ "teacherId": 2, "guardianId": 5 })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id": 6, "teacherId": 2, "guardianId": 5 })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/threads/6"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let threads = api.list_threads().await.unwrap();
    assert_eq!(threads[0].guardian_id, GuardianId::new(3));

    let created = api
        .create_thread(TeacherId::new(2), GuardianId::new(5))
        .await
        .unwrap();
    assert_eq!(created.id, ThreadId::new(6));

    api.delete_thread(created.id).await.unwrap();
}

#[tokio::test]
async fn current_user_and_companions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-7",
            "userName": "mgarcia",
            "firstName": "Maria",
            "lastName": "Garcia",
            "role": "Guardian",
            "entityId": 5,
            "schoolId": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/guardians/me/teachers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 2, "user": { "firstName": "Alan", "lastName": "Turing" } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let me = api.current_user().await.unwrap();
    assert_eq!(me.role, UserRole::Guardian);

    let teachers = api.list_companions(me.role).await.unwrap();
    assert_eq!(teachers[0].user.full_name(), "Alan Turing");

    // Roles without conversations make no request.
    assert!(api.list_companions(UserRole::Student).await.unwrap().is_empty());
}
