//! Public image browsing endpoints.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::commands::image_path;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Create the image router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/get_image_ids", get(image_ids))
        .route("/api/get_image", get(creatures))
        .route("/api/get_image/{creature}", get(creature_images))
        .route("/api/get_image/{creature}/{image_id}", get(image_file))
}

fn listing(items: Vec<String>) -> Json<Value> {
    Json(json!({ "count": items.len(), "data": items }))
}

async fn image_ids(State(state): State<AppState>) -> AppResult<Json<Value>> {
    Ok(listing(state.ranking().image_ids().await?))
}

async fn creatures(State(state): State<AppState>) -> AppResult<Json<Value>> {
    Ok(listing(state.ranking().creatures().await?))
}

async fn creature_images(
    State(state): State<AppState>,
    Path(creature): Path<String>,
) -> AppResult<Json<Value>> {
    let ids = state.ranking().image_ids_for_creature(&creature).await?;
    if ids.is_empty() {
        return Err(AppError::BadRequest("Not Valid Creature".to_string()));
    }
    Ok(listing(ids))
}

async fn image_file(
    State(state): State<AppState>,
    Path((creature, image_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let image_id = image_id.strip_suffix(".jpg").unwrap_or(&image_id);

    let ids = state.ranking().image_ids_for_creature(&creature).await?;
    if ids.is_empty() {
        return Err(AppError::BadRequest("Not Valid Creature".to_string()));
    }

    if !ids.iter().any(|id| id == image_id) {
        return match state.ranking().creature_of(image_id).await? {
            Some(location) => Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "ID found elsewhere", "location": location })),
            )
                .into_response()),
            None => Err(AppError::BadRequest("Not Valid imageID".to_string())),
        };
    }

    let path = image_path(state.images_dir(), &creature, image_id);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "image registered but missing on disk");
            return Err(AppError::NotFound);
        }
        Err(e) => return Err(anyhow::Error::from(e).context("failed to read image").into()),
    };

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}
