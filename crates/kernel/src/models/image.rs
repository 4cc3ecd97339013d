//! Image model and queries.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::StoreResult;

/// Image record as stored in `images`.
///
/// `ranking <= voted` always holds: ranking only moves together with a vote.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Image {
    pub creature: String,

    #[sqlx(rename = "imageID")]
    #[serde(rename = "imageID")]
    pub image_id: String,

    #[sqlx(rename = "userID")]
    #[serde(rename = "userID")]
    pub user_id: i64,

    /// Upload time, unix seconds.
    #[sqlx(rename = "time")]
    #[serde(rename = "createdAt")]
    pub created_at: i64,

    pub ranking: i64,

    pub voted: i64,
}

impl Image {
    /// Register a freshly uploaded image with zero votes.
    pub async fn create(
        pool: &SqlitePool,
        creature: &str,
        image_id: &str,
        user_id: i64,
    ) -> StoreResult<Self> {
        let image = sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (creature, imageID, userID, time, ranking, voted)
            VALUES (?, ?, ?, ?, 0, 0)
            RETURNING creature, imageID, userID, time, ranking, voted
            "#,
        )
        .bind(creature)
        .bind(image_id)
        .bind(user_id)
        .bind(Utc::now().timestamp())
        .fetch_one(pool)
        .await?;

        Ok(image)
    }

    /// All images in storage order.
    pub async fn list(pool: &SqlitePool) -> StoreResult<Vec<Self>> {
        let images = sqlx::query_as::<_, Image>(
            "SELECT creature, imageID, userID, time, ranking, voted FROM images ORDER BY rowid",
        )
        .fetch_all(pool)
        .await?;

        Ok(images)
    }

    pub async fn find_by_id(pool: &SqlitePool, image_id: &str) -> StoreResult<Option<Self>> {
        let image = sqlx::query_as::<_, Image>(
            r#"
            SELECT creature, imageID, userID, time, ranking, voted
            FROM images WHERE imageID = ? ORDER BY rowid LIMIT 1
            "#,
        )
        .bind(image_id)
        .fetch_optional(pool)
        .await?;

        Ok(image)
    }

    /// `voted = voted + 1`. Returns false when no row matched.
    pub async fn increment_votes(pool: &SqlitePool, image_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE images SET voted = voted + 1 WHERE imageID = ?")
            .bind(image_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// `ranking = ranking + 1`, only while `ranking < voted`. Returns false
    /// when no row matched.
    pub async fn increment_ranking(pool: &SqlitePool, image_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE images SET ranking = ranking + 1 WHERE imageID = ? AND ranking < voted",
        )
            .bind(image_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn all_ids(pool: &SqlitePool) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT imageID FROM images ORDER BY rowid")
            .fetch_all(pool)
            .await?;

        Ok(ids)
    }

    /// Distinct creature names in first-seen order.
    pub async fn creatures(pool: &SqlitePool) -> StoreResult<Vec<String>> {
        let creatures = sqlx::query_scalar::<_, String>(
            "SELECT creature FROM images GROUP BY creature ORDER BY MIN(rowid)",
        )
        .fetch_all(pool)
        .await?;

        Ok(creatures)
    }

    pub async fn ids_for_creature(pool: &SqlitePool, creature: &str) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT imageID FROM images WHERE creature = ? ORDER BY rowid",
        )
        .bind(creature)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// Creature an image was filed under, if the image exists.
    pub async fn creature_of(pool: &SqlitePool, image_id: &str) -> StoreResult<Option<String>> {
        let creature = sqlx::query_scalar::<_, String>(
            "SELECT creature FROM images WHERE imageID = ? ORDER BY rowid LIMIT 1",
        )
        .bind(image_id)
        .fetch_optional(pool)
        .await?;

        Ok(creature)
    }
}
