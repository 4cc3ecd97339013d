#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] owns a private in-memory SQLite database with the real
//! migrations, allow-list and router. The pool holds exactly one connection
//! so all statements see the same in-memory database.

#![allow(dead_code)]

use std::path::PathBuf;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use menagerie_kernel::{AppState, Config, app};

/// Open a fresh in-memory database.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite")
}

/// Test configuration: in-memory store, scratch image directory.
pub fn test_config() -> Config {
    let mut config = Config::in_memory();
    config.images_dir = scratch_dir();
    config
}

/// Unique directory under the system temp dir.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("menagerie-test-{}", Uuid::now_v7()))
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub db: SqlitePool,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = memory_pool().await;
        let state = AppState::with_pool(&config, db.clone())
            .await
            .expect("Failed to initialize AppState");
        let router = app(state.clone());

        Self { router, db, state }
    }

    /// Issue an API key for `user_id` and return the raw key.
    pub async fn api_key(&self, user_id: i64) -> String {
        self.state
            .ranking()
            .add_api_key(user_id, "test")
            .await
            .expect("Failed to issue API key")
    }

    /// Send a request through the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        authorization: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = authorization {
            builder = builder.header(header::AUTHORIZATION, auth);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(json).unwrap())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None, None).await
    }

    /// `GET /api/database/{table}` with a JSON body.
    pub async fn query(&self, table: &str, body: &Value, authorization: Option<&str>) -> (StatusCode, Value) {
        let response = self
            .request(
                Method::GET,
                &format!("/api/database/{table}"),
                Some(body),
                authorization,
            )
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }
}

/// Read a response body.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", String::from_utf8_lossy(&bytes)))
}
