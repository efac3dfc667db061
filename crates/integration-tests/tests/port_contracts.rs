//! Behaviour every `DataClient` must share, checked on the in-memory
//! adapter, plus the HTTP surface over a data service that is down.

use std::sync::Arc;

use api_adapters::{router, AppState};
use auth_adapters::StaticTokenResolver;
use axum::http::StatusCode;
use domains::{Allowlist, DataClient, DataError, FetchOptions, FixedClock, MockDataClient, OrderBy, Row};
use integration_tests::{fixed_now, get, Harness, MEDIA_BASE};
use serde_json::json;
use services::Backends;
use storage_adapters::memory::{MemoryDataClient, MemoryObjectStore};

fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(row) => row,
        _ => Row::new(),
    }
}

#[tokio::test]
async fn insert_assigns_ids_and_select_orders_and_limits() {
    let client = MemoryDataClient::new();
    for (order, title) in [(2, "c"), (0, "a"), (1, "b")] {
        let stored = client
            .insert("events", row(json!({ "order": order, "title_en": title })))
            .await
            .unwrap();
        assert!(stored["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    let rows = client
        .select("events", &FetchOptions::ordered(OrderBy::asc("order")).with_limit(2))
        .await
        .unwrap();

    let titles: Vec<_> = rows.iter().map(|r| r["title_en"].as_str().unwrap()).collect();
    assert_eq!(titles, ["a", "b"]);
}

#[tokio::test]
async fn missing_rows_are_a_distinct_not_found() {
    let client = MemoryDataClient::new();

    let read = client.select_one("teachings", "ghost").await.unwrap_err();
    let write = client
        .update("teachings", "ghost", row(json!({ "title_en": "x" })))
        .await
        .unwrap_err();

    assert!(read.is_not_found());
    assert!(write.is_not_found());
}

#[tokio::test]
async fn upsert_replaces_by_key() {
    let client = MemoryDataClient::new();

    client
        .upsert("user_roles", "user_id", row(json!({ "user_id": "u1", "role": "editor" })))
        .await
        .unwrap();
    client
        .upsert("user_roles", "user_id", row(json!({ "user_id": "u1", "role": "admin" })))
        .await
        .unwrap();

    let rows = client.rows("user_roles");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["role"], "admin");
}

#[tokio::test]
async fn a_failing_data_service_degrades_pages_instead_of_crashing() {
    let mut client = MockDataClient::new();
    client
        .expect_select()
        .returning(|table, _| Err(DataError::backend(table, "connection refused")));
    client
        .expect_select_one()
        .returning(|table, _| Err(DataError::backend(table, "connection refused")));
    let backends = Backends {
        client: Arc::new(client),
        storage: Arc::new(MemoryObjectStore::new(MEDIA_BASE)),
        bucket: "temple".into(),
        clock: Arc::new(FixedClock(fixed_now())),
    };
    let h = Harness {
        client: Arc::new(MemoryDataClient::new()),
        storage: Arc::new(MemoryObjectStore::new(MEDIA_BASE)),
        router: router(AppState::new(
            backends,
            Arc::new(StaticTokenResolver::new()),
            Allowlist::default(),
        )),
    };

    let (feed, body) = h.call(get("/api/feed")).await;
    let (about, _) = h.call(get("/api/about")).await;
    let (search, results) = h.call(get("/api/search?q=vesak")).await;

    assert_eq!(feed, StatusCode::BAD_GATEWAY);
    assert_eq!(body["section"]["status"], "failed");
    assert_eq!(body["section"]["data"]["reason"], "could not load posts");
    assert_eq!(about, StatusCode::BAD_GATEWAY);
    assert_eq!(search, StatusCode::OK);
    assert_eq!(results["section"]["data"]["state"], "no_results");
}
