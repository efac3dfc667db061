use axum::http::{Method, StatusCode};
use integration_tests::*;
use serde_json::json;

#[tokio::test]
async fn dashboard_is_gated_by_access_level() {
    let h = Harness::new();

    let (anonymous, _) = h.call(get("/api/admin/events")).await;
    let (member, _) = h.call(get_as("/api/admin/events", MEMBER)).await;
    let (editor, list) = h.call(get_as("/api/admin/events", EDITOR)).await;

    assert_eq!(anonymous, StatusCode::UNAUTHORIZED);
    assert_eq!(member, StatusCode::FORBIDDEN);
    assert_eq!(editor, StatusCode::OK);
    assert_eq!(list["kind"], "events");
    assert_eq!(list["items"][0]["id"], "e2");
    assert!(list["fields"].as_array().unwrap().iter().any(|f| f["name"] == "imgSrc"));
}

#[tokio::test]
async fn create_lands_in_order_and_stamps_posts() {
    let h = Harness::new();

    let (status, outcome) = h
        .call(send_json(
            Method::POST,
            "/api/admin/events",
            Some(EDITOR),
            json!({
                "order": "0",
                "imgSrc": "https://cdn.example.org/new.jpg",
                "title_en": "Khmer New Year",
                "imageUrls": ["https://cdn.example.org/a.jpg", "https://cdn.example.org/b.jpg"],
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(outcome["mode"], "create");
    let id = outcome["id"].as_str().unwrap().to_string();

    let (_, stored) = h.call(get_as(&format!("/api/admin/events/{id}"), ABBOT)).await;
    assert_eq!(stored["values"]["order"], 0);
    assert_eq!(stored["values"]["imageUrls"].as_array().unwrap().len(), 2);

    let (_, post) = h
        .call(send_json(
            Method::POST,
            "/api/admin/posts",
            Some(ABBOT),
            json!({ "title": "Alms round", "content": "Every morning at 7." }),
        ))
        .await;
    let post_id = post["id"].as_str().unwrap();
    let row = h
        .client
        .rows("posts")
        .into_iter()
        .find(|r| r["id"] == post_id)
        .unwrap();
    assert_eq!(row["author"], "Venerable Sok");
    assert_eq!(row["timestamp"], "2024-05-22T06:30:00.000Z");
}

#[tokio::test]
async fn invalid_forms_are_refused_without_writing() {
    let h = Harness::new();
    let before = h.client.rows("events").len();

    let (missing_image, _) = h
        .call(send_json(Method::POST, "/api/admin/events", Some(EDITOR), json!({ "title_en": "No cover" })))
        .await;
    let (bad_number, _) = h
        .call(send_json(
            Method::POST,
            "/api/admin/events",
            Some(EDITOR),
            json!({ "order": "first", "imgSrc": "https://cdn.example.org/x.jpg" }),
        ))
        .await;
    let (unknown_kind, _) = h
        .call(send_json(Method::POST, "/api/admin/relics", Some(EDITOR), json!({})))
        .await;

    assert_eq!(missing_image, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(bad_number, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(unknown_kind, StatusCode::NOT_FOUND);
    assert_eq!(h.client.rows("events").len(), before);
}

#[tokio::test]
async fn update_keeps_unsent_fields_and_is_idempotent() {
    let h = Harness::new();
    let edit = json!({ "title_en": "Pchum Ben Festival" });

    let (first, outcome) = h
        .call(send_json(Method::PUT, "/api/admin/events/e1", Some(EDITOR), edit.clone()))
        .await;
    let (second, _) = h
        .call(send_json(Method::PUT, "/api/admin/events/e1", Some(EDITOR), edit))
        .await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(outcome["mode"], "update");
    let (_, page) = h.call(get("/api/events/e1?lang=km")).await;
    assert_eq!(page["section"]["data"]["title"], "ភ្ជុំបិណ្ឌ");
    let (_, page) = h.call(get("/api/events/e1")).await;
    assert_eq!(page["section"]["data"]["title"], "Pchum Ben Festival");
    assert_eq!(h.client.rows("events").len(), 2);

    let (missing, _) = h
        .call(send_json(Method::PUT, "/api/admin/events/e404", Some(EDITOR), json!({})))
        .await;
    assert_eq!(missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_needs_explicit_confirmation() {
    let h = Harness::new();

    let (unconfirmed, _) = h.call(delete_as("/api/admin/gallery/g1", EDITOR)).await;
    assert_eq!(unconfirmed, StatusCode::CONFLICT);
    assert_eq!(h.client.rows("gallery").len(), 1);

    let (confirmed, _) = h.call(delete_as("/api/admin/gallery/g1?confirm=true", EDITOR)).await;
    assert_eq!(confirmed, StatusCode::NO_CONTENT);
    assert!(h.client.rows("gallery").is_empty());
}

#[tokio::test]
async fn singleton_pages_load_empty_and_upsert_by_slug() {
    let h = Harness::new();

    let (_, contact) = h.call(get_as("/api/admin/pages/contact", EDITOR)).await;
    assert_eq!(contact["values"]["phone"], "");

    let (saved, form) = h
        .call(send_json(
            Method::PUT,
            "/api/admin/pages/contact",
            Some(EDITOR),
            json!({ "phone": "+855 12 345 678", "address_km": "ភ្នំពេញ" }),
        ))
        .await;
    assert_eq!(saved, StatusCode::OK);
    assert_eq!(form["values"]["phone"], "+855 12 345 678");

    let (_, public) = h.call(get("/api/contact?lang=km")).await;
    assert_eq!(public["section"]["data"]["address"], "ភ្នំពេញ");
    assert_eq!(public["section"]["data"]["phone"], "+855 12 345 678");

    let (unknown, _) = h.call(get_as("/api/admin/pages/donate", EDITOR)).await;
    assert_eq!(unknown, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn moderation_and_roles_are_admin_only() {
    let h = Harness::new();
    h.call(send_json(Method::POST, "/api/comments", Some(MEMBER), json!({ "text": "Buy cheap watches" })))
        .await;

    let (editor, _) = h.call(get_as("/api/admin/comments", EDITOR)).await;
    assert_eq!(editor, StatusCode::FORBIDDEN);

    let (_, comments) = h.call(get_as("/api/admin/comments", ABBOT)).await;
    let id = comments["data"][0]["id"].as_str().unwrap().to_string();
    let (removed, _) = h
        .call(delete_as(&format!("/api/admin/comments/{id}?confirm=true"), ABBOT))
        .await;
    assert_eq!(removed, StatusCode::NO_CONTENT);
    assert!(h.client.rows("comments").is_empty());

    let (granted, _) = h
        .call(send_json(Method::PUT, "/api/admin/roles/member-uid", Some(ABBOT), json!({ "role": "editor" })))
        .await;
    assert_eq!(granted, StatusCode::OK);
    let (now_editor, _) = h.call(get_as("/api/admin/events", MEMBER)).await;
    assert_eq!(now_editor, StatusCode::OK);

    let (_, roles) = h.call(get_as("/api/admin/roles", ABBOT)).await;
    assert_eq!(roles["data"].as_array().unwrap().len(), 2);

    let (revoked, _) = h
        .call(delete_as("/api/admin/roles/member-uid?confirm=true", ABBOT))
        .await;
    assert_eq!(revoked, StatusCode::NO_CONTENT);
    let (member_again, _) = h.call(get_as("/api/admin/events", MEMBER)).await;
    assert_eq!(member_again, StatusCode::FORBIDDEN);
}
