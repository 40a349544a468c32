use axum::extract::State;
use axum::response::Response;
use serde_json::json;

use super::notify;
use crate::auth::CurrentUser;
use crate::models::{NewNotification, User, UserRole};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::AppPath;
use crate::utils::response::{created, no_content, success};

/// Only organizers and admins publish events, so only they can be followed.
async fn load_organizer(state: &AppState, id: i32) -> Result<User, AppError> {
    let user = state
        .storage
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Organizer not found".to_string()))?;
    if user.role == UserRole::User {
        return Err(AppError::ValidationError(
            "User is not an organizer".to_string(),
        ));
    }
    Ok(user)
}

pub async fn follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(organizer_id): AppPath<i32>,
) -> Result<Response, AppError> {
    if organizer_id == user.id {
        return Err(AppError::ValidationError(
            "You cannot follow yourself".to_string(),
        ));
    }
    let organizer = load_organizer(&state, organizer_id).await?;

    let edge = state
        .storage
        .follow_organizer(user.id, organizer.id)
        .await?;
    tracing::info!(follower_id = user.id, organizer_id, "Organizer followed");

    notify(
        state.storage.as_ref(),
        NewNotification::follow(organizer.id, user.id, user.display_name()),
    )
    .await;

    Ok(created(edge))
}

pub async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(organizer_id): AppPath<i32>,
) -> Result<Response, AppError> {
    if !state
        .storage
        .unfollow_organizer(user.id, organizer_id)
        .await?
    {
        return Err(AppError::NotFound(
            "Not following this organizer".to_string(),
        ));
    }
    Ok(no_content())
}

pub async fn follow_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(organizer_id): AppPath<i32>,
) -> Result<Response, AppError> {
    let following = state.storage.is_following(user.id, organizer_id).await?;
    Ok(success(json!({ "following": following })))
}

pub async fn followers(
    State(state): State<AppState>,
    AppPath(organizer_id): AppPath<i32>,
) -> Result<Response, AppError> {
    let organizer = load_organizer(&state, organizer_id).await?;
    Ok(success(state.storage.followers_of(organizer.id).await?))
}

pub async fn my_following(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    Ok(success(state.storage.following_of(user.id).await?))
}
