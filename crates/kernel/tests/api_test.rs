#![allow(clippy::unwrap_used, clippy::expect_used)]
//! HTTP API integration tests.

mod common;

use axum::http::{Method, StatusCode, header};
use serde_json::json;

use menagerie_test_utils::{assert, insert_suggestion, logic, test_image};

use common::{TestApp, body_bytes, body_json, test_config};

async fn seeded() -> TestApp {
    let app = TestApp::new().await;
    test_image("owlbear").with_id("ob-1").insert(&app.db).await.unwrap();
    test_image("owlbear").with_id("ob-2").insert(&app.db).await.unwrap();
    test_image("beholder").with_id("bh-1").insert(&app.db).await.unwrap();
    app
}

#[tokio::test]
async fn query_with_key_returns_count_and_data() {
    let app = seeded().await;
    let key = app.api_key(1).await;

    let (status, body) = app
        .query(
            "images",
            &json!({"logic": logic::and([logic::eq("creature", "owlbear")])}),
            Some(&key),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert::listing_len(&body, 2);
    assert_eq!(body["data"][0]["imageID"], "ob-1");
    assert_eq!(body["data"][0]["creature"], "owlbear");
    assert::has_key(&body["data"][0], "createdAt");
}

#[tokio::test]
async fn bearer_prefix_is_accepted() {
    let app = seeded().await;
    let key = app.api_key(1).await;

    let (status, body) = app
        .query(
            "images",
            &json!({"logic": logic::eq("imageID", "bh-1"), "kind": "get_image_data"}),
            Some(&format!("Bearer {key}")),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert::listing_len(&body, 1);
}

#[tokio::test]
async fn missing_header_is_bad_request() {
    let app = seeded().await;
    let (status, body) = app
        .query("images", &json!({"logic": logic::eq("creature", "owlbear")}), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::jsonsql_error(&body, "Missing Authorization header");
}

#[tokio::test]
async fn unknown_key_is_unauthorized() {
    let app = seeded().await;
    let (status, body) = app
        .query(
            "images",
            &json!({"logic": logic::eq("creature", "owlbear")}),
            Some("definitely-not-a-key"),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::jsonsql_error(&body, "Invalid API key");
}

#[tokio::test]
async fn compile_errors_are_bad_request() {
    let app = seeded().await;
    let key = app.api_key(1).await;

    let (status, body) = app
        .query(
            "images",
            &json!({"logic": {"and": [{"eq": ["password", "x"]}]}}),
            Some(&key),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::jsonsql_error(&body, "unknown column 'password' at $.and[0].eq");
}

#[tokio::test]
async fn unknown_table_is_bad_request() {
    let app = seeded().await;
    let key = app.api_key(1).await;

    let (status, body) = app
        .query("apikeys", &json!({"logic": logic::eq("userID", 1)}), Some(&key))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::jsonsql_error(&body, "unknown table 'apikeys'");
}

#[tokio::test]
async fn suggestions_kind_allows_unfiltered_reads() {
    let app = seeded().await;
    insert_suggestion(&app.db, "more mimics", 5).await.unwrap();
    let key = app.api_key(1).await;

    let (status, body) = app.query("suggestions", &json!({}), Some(&key)).await;

    assert_eq!(status, StatusCode::OK);
    assert::listing_len(&body, 1);
    assert_eq!(body["data"][0]["suggestion"], "more mimics");
}

#[tokio::test]
async fn post_is_accepted_for_queries() {
    let app = seeded().await;
    let key = app.api_key(1).await;

    let response = app
        .request(
            Method::POST,
            "/api/database/images",
            Some(&json!({"logic": logic::eq("creature", "beholder")})),
            Some(&key),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert::listing_len(&body_json(response).await, 1);
}

#[tokio::test]
async fn image_listings() {
    let app = seeded().await;

    let body = body_json(app.get("/api/get_image_ids").await).await;
    assert::listing_len(&body, 3);

    let body = body_json(app.get("/api/get_image").await).await;
    assert::json_eq(&body, &json!({"count": 2, "data": ["owlbear", "beholder"]}));

    let body = body_json(app.get("/api/get_image/owlbear").await).await;
    assert::json_eq(&body, &json!({"count": 2, "data": ["ob-1", "ob-2"]}));
}

#[tokio::test]
async fn image_lookup_errors() {
    let app = seeded().await;

    let response = app.get("/api/get_image/tarrasque").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert::json_eq(&body_json(response).await, &json!({"error": "Not Valid Creature"}));

    let response = app.get("/api/get_image/owlbear/nope").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert::json_eq(&body_json(response).await, &json!({"error": "Not Valid imageID"}));

    let response = app.get("/api/get_image/owlbear/bh-1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert::json_eq(
        &body_json(response).await,
        &json!({"error": "ID found elsewhere", "location": "beholder"}),
    );
}

#[tokio::test]
async fn image_file_is_served() {
    let config = test_config();
    let dir = config.images_dir.join("owlbear");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("ob-1.jpg"), b"\xFF\xD8\xFFfake").unwrap();

    let app = TestApp::with_config(config).await;
    test_image("owlbear").with_id("ob-1").insert(&app.db).await.unwrap();

    let response = app.get("/api/get_image/owlbear/ob-1.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(body_bytes(response).await, b"\xFF\xD8\xFFfake");
}

#[tokio::test]
async fn registered_image_missing_on_disk_is_not_found() {
    let app = seeded().await;
    let response = app.get("/api/get_image/owlbear/ob-1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_failure_is_internal_error() {
    let app = seeded().await;
    let key = app.api_key(1).await;
    sqlx::query("DROP TABLE images").execute(&app.db).await.unwrap();

    let (status, body) = app
        .query("images", &json!({"logic": logic::eq("creature", "owlbear")}), Some(&key))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert::json_eq(&body, &json!({"JsonSQL error": "store execution failure"}));

    let text = String::from_utf8(body_bytes(app.get("/metrics").await).await).unwrap();
    assert::contains(&text, r#"outcome="error""#);
    assert::contains(&text, "jsonsql_store_retries_total 1");
    assert::not_contains(&text, r#"outcome="rejected""#);
    assert::not_contains(&text, "jsonsql_rejections_total{");
}

#[tokio::test]
async fn health_and_metrics() {
    let app = seeded().await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert::json_eq(
        &body_json(response).await,
        &json!({"status": "healthy", "database": true}),
    );

    let key = app.api_key(1).await;
    app.query("images", &json!({"logic": logic::eq("nope", 1)}), Some(&key))
        .await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert::contains(&text, "jsonsql_rejections_total");
    assert::contains(&text, r#"rule="unknown_column""#);
}
