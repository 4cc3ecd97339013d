//! Suggestion model.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::StoreResult;

/// Free-text suggestion left by a user. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Suggestion {
    #[sqlx(rename = "suggestion")]
    #[serde(rename = "suggestion")]
    pub text: String,

    #[sqlx(rename = "userID")]
    #[serde(rename = "userID")]
    pub user_id: i64,

    #[sqlx(rename = "time")]
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl Suggestion {
    pub async fn create(pool: &SqlitePool, text: &str, user_id: i64) -> StoreResult<Self> {
        let suggestion = sqlx::query_as::<_, Suggestion>(
            r#"
            INSERT INTO suggestions (suggestion, userID, time)
            VALUES (?, ?, ?)
            RETURNING suggestion, userID, time
            "#,
        )
        .bind(text)
        .bind(user_id)
        .bind(Utc::now().timestamp())
        .fetch_one(pool)
        .await?;

        Ok(suggestion)
    }
}
