//! Creature ranking store.
//!
//! Thin service over the `images`, `apikeys` and `suggestions` models. Each
//! call is a single statement on a pooled connection; nothing spans calls.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::models::{ApiKey, Image, Suggestion};

/// An image offered up for voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteCandidate {
    pub creature: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub voted: i64,
    pub ranking: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
}

impl From<Image> for VoteCandidate {
    fn from(image: Image) -> Self {
        Self {
            creature: image.creature,
            image_id: image.image_id,
            voted: image.voted,
            ranking: image.ranking,
            user_id: image.user_id,
        }
    }
}

/// Ranking and vote store.
#[derive(Debug, Clone)]
pub struct RankingStore {
    pool: SqlitePool,
}

impl RankingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register an uploaded image with `ranking = voted = 0`.
    pub async fn add_image(&self, creature: &str, image_id: &str, user_id: i64) -> StoreResult<Image> {
        let image = Image::create(&self.pool, creature, image_id, user_id).await?;
        info!(creature = %creature, image_id = %image_id, user_id, "image registered");
        Ok(image)
    }

    /// Count one vote. Returns false if the image does not exist.
    pub async fn increment_votes(&self, image_id: &str) -> StoreResult<bool> {
        let updated = Image::increment_votes(&self.pool, image_id).await?;
        debug!(image_id = %image_id, updated, "votes incremented");
        Ok(updated)
    }

    /// Count one positive vote. Returns false if the image does not exist or
    /// every recorded vote is already positive.
    pub async fn increment_ranking(&self, image_id: &str) -> StoreResult<bool> {
        let updated = Image::increment_ranking(&self.pool, image_id).await?;
        debug!(image_id = %image_id, updated, "ranking incremented");
        Ok(updated)
    }

    /// The less-voted half of all images, fewest votes first.
    pub async fn bottom_voted(&self) -> StoreResult<Vec<VoteCandidate>> {
        let images = Image::list(&self.pool).await?;
        Ok(bottom_half(images))
    }

    /// Issue an API key. Returns the raw key, which is not retrievable later.
    pub async fn add_api_key(&self, user_id: i64, name: &str) -> StoreResult<String> {
        let (_, raw_key) = ApiKey::create(&self.pool, user_id, name).await?;
        info!(user_id, name = %name, "API key issued");
        Ok(raw_key)
    }

    /// Remove every key owned by `user_id`. Returns how many were removed.
    pub async fn revoke_api_keys(&self, user_id: i64) -> StoreResult<u64> {
        let revoked = ApiKey::revoke_for_user(&self.pool, user_id).await?;
        info!(user_id, revoked, "API keys revoked");
        Ok(revoked)
    }

    pub async fn verify_api_key(&self, raw_key: &str) -> StoreResult<bool> {
        Ok(ApiKey::find_by_key(&self.pool, raw_key).await?.is_some())
    }

    pub async fn add_suggestion(&self, text: &str, user_id: i64) -> StoreResult<Suggestion> {
        Suggestion::create(&self.pool, text, user_id).await
    }

    pub async fn image_ids(&self) -> StoreResult<Vec<String>> {
        Image::all_ids(&self.pool).await
    }

    pub async fn creatures(&self) -> StoreResult<Vec<String>> {
        Image::creatures(&self.pool).await
    }

    pub async fn image_ids_for_creature(&self, creature: &str) -> StoreResult<Vec<String>> {
        Image::ids_for_creature(&self.pool, creature).await
    }

    pub async fn creature_of(&self, image_id: &str) -> StoreResult<Option<String>> {
        Image::creature_of(&self.pool, image_id).await
    }
}

/// Stable ascending sort by `voted`, keeping the first `floor(n / 2)`.
fn bottom_half(mut images: Vec<Image>) -> Vec<VoteCandidate> {
    let keep = images.len() / 2;
    images.sort_by_key(|image| image.voted);
    images.truncate(keep);
    images.into_iter().map(VoteCandidate::from).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn image(id: &str, voted: i64) -> Image {
        Image {
            creature: "owlbear".to_string(),
            image_id: id.to_string(),
            user_id: 1,
            created_at: 0,
            ranking: 0,
            voted,
        }
    }

    #[test]
    fn bottom_half_of_four() {
        let images = vec![image("a", 5), image("b", 1), image("c", 3), image("d", 2)];
        let voted: Vec<i64> = bottom_half(images).iter().map(|c| c.voted).collect();
        assert_eq!(voted, vec![1, 2]);
    }

    #[test]
    fn bottom_half_of_three_floors() {
        let images = vec![image("a", 1), image("b", 2), image("c", 3)];
        let candidates = bottom_half(images);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].voted, 1);
    }

    #[test]
    fn ties_keep_retrieval_order() {
        let images = vec![image("a", 2), image("b", 0), image("c", 0), image("d", 0)];
        let ids: Vec<String> = bottom_half(images).into_iter().map(|c| c.image_id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn fewer_than_two_images_yield_nothing() {
        assert!(bottom_half(Vec::new()).is_empty());
        assert!(bottom_half(vec![image("a", 0)]).is_empty());
    }
}
