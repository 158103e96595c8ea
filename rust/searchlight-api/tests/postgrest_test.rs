//! PostgREST repository tests against a `wiremock` server.

use std::time::Duration;

use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use searchlight_api::database::{LibraryRepository, PostgrestClient, StoreError, UserRepository};
use searchlight_api::domain::{
    LibraryFilter, NewSearchRecord, NewUser, RecordPatch, SearchType, SortOrder,
};

const ANON_KEY: &str = "anon-test-key";

fn client(server: &MockServer) -> PostgrestClient {
    PostgrestClient::new(&server.uri(), ANON_KEY, Duration::from_secs(5)).unwrap()
}

fn row(id: i64, input: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "searchInput": input,
        "userEmail": "alice@example.com",
        "type": kind,
        "searchId": null,
        "aiModel": null,
        "searchResults": null,
        "created_at": "2024-05-01T12:00:00+00:00"
    })
}

#[tokio::test]
async fn test_insert_posts_array_with_auth_headers() {
    let server = MockServer::start().await;
    let search_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/Library"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", format!("Bearer {ANON_KEY}").as_str()))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!([{
            "searchInput": "tides",
            "userEmail": "alice@example.com",
            "type": "search",
            "searchId": search_id
        }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(1, "tides", "search")])))
        .expect(1)
        .mount(&server)
        .await;

    let record =
        NewSearchRecord::provisional("tides", "alice@example.com", SearchType::Search, search_id)
            .unwrap();
    let stored = client(&server).insert(&record).await.unwrap();
    assert_eq!(stored.id, 1);
    assert_eq!(stored.search_input, "tides");
}

#[tokio::test]
async fn test_select_builds_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/Library"))
        .and(query_param("select", "*"))
        .and(query_param("userEmail", "eq.alice@example.com"))
        .and(query_param("type", "eq.research"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(4, "deep", "research")])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = LibraryFilter::for_user("alice@example.com").with_kind(Some(SearchType::Research));
    let rows = client(&server).select(&filter, SortOrder::Oldest).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, SearchType::Research);
}

#[tokio::test]
async fn test_update_patches_by_id() {
    let server = MockServer::start().await;
    let mut enriched = row(9, "tides", "search");
    enriched["aiModel"] = json!("GPT-4o");
    enriched["searchResults"] = json!({"webResults": []});

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/Library"))
        .and(query_param("id", "eq.9"))
        .and(body_json(json!({"searchResults": {"webResults": []}, "aiModel": "GPT-4o"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([enriched])))
        .mount(&server)
        .await;

    let patch = RecordPatch {
        search_results: Some(json!({"webResults": []})),
        ai_model: Some("GPT-4o".into()),
    };
    let updated = client(&server).update(9, &patch).await.unwrap();
    assert_eq!(updated.ai_model.as_deref(), Some("GPT-4o"));
}

#[tokio::test]
async fn test_missing_rows_are_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.update(3, &RecordPatch::default()).await.unwrap_err(),
        StoreError::NotFound(3)
    );
    assert_eq!(client.delete(3).await.unwrap_err(), StoreError::NotFound(3));
}

#[tokio::test]
async fn test_rejection_carries_datastore_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "PGRST301",
            "message": "JWT expired"
        })))
        .mount(&server)
        .await;

    let record = NewSearchRecord::provisional(
        "tides",
        "alice@example.com",
        SearchType::Search,
        Uuid::new_v4(),
    )
    .unwrap();
    let err = client(&server).insert(&record).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Rejected {
            status: 401,
            message: "JWT expired".into()
        }
    );
}

#[tokio::test]
async fn test_ping_counts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/Library"))
        .and(query_param("select", "count"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"count": 12}])))
        .mount(&server)
        .await;

    let data = client(&server).ping().await.unwrap();
    assert_eq!(data[0]["count"], 12);
}

#[tokio::test]
async fn test_ensure_user_creates_missing_row() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/Users"))
        .and(query_param("email", "eq.carol@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/Users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": 5,
            "name": "Carol",
            "email": "carol@example.com",
            "created_at": "2024-05-01T12:00:00+00:00"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let user = client(&server)
        .ensure_user(&NewUser {
            name: "Carol".into(),
            email: "carol@example.com".into(),
        })
        .await
        .unwrap();
    assert_eq!(user.id, 5);
}

#[tokio::test]
async fn test_unreachable_datastore_is_transport_error() {
    let client = PostgrestClient::new("http://127.0.0.1:9", ANON_KEY, Duration::from_secs(2)).unwrap();
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)), "got {err:?}");
}
