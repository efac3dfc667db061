//! Shared fixtures for the end-to-end tests: the full router over in-memory
//! adapters, three signed-in identities and request helpers.

use std::sync::Arc;

use api_adapters::{router, AppState};
use auth_adapters::StaticTokenResolver;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use domains::{Allowlist, FixedClock, RawSession};
use serde_json::{json, Value};
use services::Backends;
use storage_adapters::memory::{MemoryDataClient, MemoryObjectStore};
use tower::ServiceExt;

/// Allowlisted: full access without any stored role.
pub const ABBOT: &str = "abbot-token";
/// Stored role `editor`.
pub const EDITOR: &str = "editor-token";
/// Signed in, no role.
pub const MEMBER: &str = "member-token";

pub const BUCKET: &str = "temple";
pub const MEDIA_BASE: &str = "https://cdn.example.org";

fn session(id: &str, name: &str) -> RawSession {
    RawSession {
        user_id: id.to_string(),
        email: Some(format!("{id}@example.org")),
        user_metadata: json!({ "full_name": name }),
    }
}

pub fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 22, 6, 30, 0).unwrap()
}

pub struct Harness {
    pub client: Arc<MemoryDataClient>,
    pub storage: Arc<MemoryObjectStore>,
    pub router: Router,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(MemoryObjectStore::new(MEDIA_BASE))
    }

    pub fn with_storage(storage: MemoryObjectStore) -> Self {
        let client = Arc::new(MemoryDataClient::new());
        seed(&client);
        let storage = Arc::new(storage);
        let backends = Backends {
            client: client.clone(),
            storage: storage.clone(),
            bucket: BUCKET.to_string(),
            clock: Arc::new(FixedClock(fixed_now())),
        };
        let resolver = StaticTokenResolver::new()
            .with_token(ABBOT, session("abbot-uid", "Venerable Sok"))
            .with_token(EDITOR, session("editor-uid", "Dara"))
            .with_token(MEMBER, session("member-uid", "Srey Mom"));
        let state = AppState::new(backends, Arc::new(resolver), Allowlist::new(["abbot-uid"]));
        Self {
            client,
            storage,
            router: router(state),
        }
    }

    /// Sends one request through the router; the body is parsed as JSON,
    /// `Null` when empty.
    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }
}

fn seed(client: &MemoryDataClient) {
    client.seed(
        "posts",
        [
            json!({ "id": "p1", "title": "Vesak preparations", "content": "Lanterns on the **main hall**.", "author": "Admin", "timestamp": "2024-05-01T08:00:00.000Z" }),
            json!({ "id": "p2", "title": "New roof", "content": "Thank you to all donors.", "author": "Admin", "timestamp": "2024-05-10T08:00:00.000Z" }),
        ],
    );
    client.seed(
        "events",
        [
            json!({ "id": "e1", "order": 1, "imgSrc": "https://cdn.example.org/pb.jpg", "title_en": "Pchum Ben", "title_km": "ភ្ជុំបិណ្ឌ", "date_en": "September", "imageUrls": [] }),
            json!({ "id": "e2", "order": 0, "imgSrc": "https://cdn.example.org/vesak.jpg", "title_en": "Vesak Bochea", "title_km": "វិសាខបូជា", "date_en": "May", "imageUrls": [] }),
        ],
    );
    client.seed(
        "gallery",
        [json!({ "id": "g1", "order": 0, "title_en": "Kathina 2023", "thumbnailUrl": "https://cdn.example.org/k.jpg", "imageUrls": ["https://cdn.example.org/k1.jpg"] })],
    );
    client.seed(
        "teachings",
        [json!({ "id": "t1", "order": 0, "title_en": "On generosity", "thumbnailUrl": "https://cdn.example.org/t.jpg" })],
    );
    client.seed(
        "pages",
        [json!({ "id": "about", "headline_en": "Welcome", "headline_km": "សូមស្វាគមន៍", "history_en": "Founded in 1998." })],
    );
    client.seed("user_roles", [json!({ "user_id": "editor-uid", "role": "editor" })]);
}

pub fn get(uri: &str) -> Request<Body> {
    request(Method::GET, uri, None, None)
}

pub fn get_as(uri: &str, token: &str) -> Request<Body> {
    request(Method::GET, uri, Some(token), None)
}

pub fn send_json(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    request(method, uri, token, Some(body))
}

pub fn delete_as(uri: &str, token: &str) -> Request<Body> {
    request(Method::DELETE, uri, Some(token), None)
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}
