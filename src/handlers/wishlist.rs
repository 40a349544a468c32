use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::auth::CurrentUser;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{created, no_content, success};

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    Ok(success(state.storage.wishlist_events(user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub event_id: i32,
}

pub async fn add(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<WishlistRequest>,
) -> Result<Response, AppError> {
    let entry = state
        .storage
        .add_to_wishlist(user.id, payload.event_id)
        .await?;
    tracing::debug!(user_id = user.id, event_id = payload.event_id, "Wishlist entry added");
    Ok(created(entry))
}

pub async fn contains(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(event_id): AppPath<i32>,
) -> Result<Response, AppError> {
    let in_wishlist = state.storage.is_in_wishlist(user.id, event_id).await?;
    Ok(success(json!({ "inWishlist": in_wishlist })))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(event_id): AppPath<i32>,
) -> Result<Response, AppError> {
    if !state
        .storage
        .remove_from_wishlist(user.id, event_id)
        .await?
    {
        return Err(AppError::NotFound(
            "Event not in wishlist".to_string(),
        ));
    }
    Ok(no_content())
}
