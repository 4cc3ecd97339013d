//! API key model for JsonSQL authentication.
//!
//! Only the SHA-256 hash of a key is persisted. Lookups go straight to the
//! store so a revoked key stops verifying immediately.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::error::StoreResult;

/// API key record (never contains the raw key).
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ApiKey {
    #[serde(skip)]
    #[sqlx(rename = "key")]
    pub key_hash: String,

    #[sqlx(rename = "userID")]
    #[serde(rename = "userID")]
    pub user_id: i64,

    pub name: String,

    #[sqlx(rename = "time")]
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl ApiKey {
    /// Issue a new key for a user.
    ///
    /// Returns `(ApiKey, raw_key)`. The raw key is shown once and never stored.
    pub async fn create(pool: &SqlitePool, user_id: i64, name: &str) -> StoreResult<(Self, String)> {
        let raw_key = generate_key();
        let key_hash = hash_key(&raw_key);

        let record = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO apikeys (key, userID, name, time)
            VALUES (?, ?, ?, ?)
            RETURNING key, userID, name, time
            "#,
        )
        .bind(&key_hash)
        .bind(user_id)
        .bind(name)
        .bind(Utc::now().timestamp())
        .fetch_one(pool)
        .await?;

        Ok((record, raw_key))
    }

    /// Look up a key by its raw value.
    pub async fn find_by_key(pool: &SqlitePool, raw_key: &str) -> StoreResult<Option<Self>> {
        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT key, userID, name, time FROM apikeys WHERE key = ?",
        )
        .bind(hash_key(raw_key))
        .fetch_optional(pool)
        .await?;

        Ok(key)
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> StoreResult<Vec<Self>> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT key, userID, name, time FROM apikeys WHERE userID = ? ORDER BY rowid",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(keys)
    }

    /// Delete every key owned by `user_id`. Returns the number removed.
    pub async fn revoke_for_user(pool: &SqlitePool, user_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM apikeys WHERE userID = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Generate a 32-byte random hex key.
fn generate_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hash a key for storage.
fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
