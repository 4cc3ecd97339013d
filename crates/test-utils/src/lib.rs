//! Menagerie test utilities.
//!
//! Helpers for integration testing: image fixtures, JsonSQL expression
//! builders, and assertion utilities.

use sqlx::SqlitePool;
use uuid::Uuid;

/// Create a test image with default values.
pub fn test_image(creature: &str) -> TestImage {
    TestImage {
        creature: creature.to_string(),
        image_id: Uuid::now_v7().to_string(),
        user_id: 1,
        time: 1_700_000_000,
        ranking: 0,
        voted: 0,
    }
}

/// A test image builder for creating `images` rows directly.
#[derive(Debug, Clone)]
pub struct TestImage {
    pub creature: String,
    pub image_id: String,
    pub user_id: i64,
    pub time: i64,
    pub ranking: i64,
    pub voted: i64,
}

impl TestImage {
    /// Set a custom image ID.
    pub fn with_id(mut self, image_id: &str) -> Self {
        self.image_id = image_id.to_string();
        self
    }

    /// Set the uploader.
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    /// Set vote counters. `ranking` is clamped to `voted`.
    pub fn with_votes(mut self, voted: i64, ranking: i64) -> Self {
        self.voted = voted;
        self.ranking = ranking.min(voted);
        self
    }

    /// Insert the row.
    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO images (creature, imageID, userID, time, ranking, voted) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.creature)
        .bind(&self.image_id)
        .bind(self.user_id)
        .bind(self.time)
        .bind(self.ranking)
        .bind(self.voted)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Insert a suggestion row directly.
pub async fn insert_suggestion(pool: &SqlitePool, text: &str, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO suggestions (suggestion, userID, time) VALUES (?, ?, ?)")
        .bind(text)
        .bind(user_id)
        .bind(1_700_000_000_i64)
        .execute(pool)
        .await?;
    Ok(())
}

/// JsonSQL expression builders.
pub mod logic {
    use serde_json::{Map, Value, json};

    /// `{"<op>": [column, value]}`
    pub fn cmp(op: &str, column: &str, value: impl Into<Value>) -> Value {
        let mut node = Map::new();
        node.insert(op.to_string(), json!([column, value.into()]));
        Value::Object(node)
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Value {
        cmp("eq", column, value)
    }

    pub fn and(children: impl IntoIterator<Item = Value>) -> Value {
        json!({ "and": children.into_iter().collect::<Vec<_>>() })
    }

    pub fn or(children: impl IntoIterator<Item = Value>) -> Value {
        json!({ "or": children.into_iter().collect::<Vec<_>>() })
    }

    pub fn not(child: Value) -> Value {
        json!({ "not": [child] })
    }

    /// `depth` nested `not` wrappers around `eq(voted, 0)`.
    pub fn nested(depth: usize) -> Value {
        (0..depth).fold(eq("voted", 0), |node, _| not(node))
    }
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(actual, expected, "JSON mismatch:\nactual: {actual:#}\nexpected: {expected:#}");
    }

    /// Assert a `{"count": n, "data": [...]}` payload with `n` entries.
    pub fn listing_len(value: &Value, expected: usize) {
        let data = value
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::len);
        assert_eq!(data, Some(expected), "unexpected listing: {value}");
        assert_eq!(
            value.get("count").and_then(Value::as_u64),
            Some(expected as u64),
            "count disagrees with data: {value}"
        );
    }

    /// Assert a JsonSQL error body whose message contains `needle`.
    pub fn jsonsql_error(value: &Value, needle: &str) {
        let message = value
            .get("JsonSQL error")
            .and_then(Value::as_str)
            .unwrap_or_default();
        assert!(
            message.contains(needle),
            "Expected JsonSQL error containing '{needle}', got: {value}"
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}
