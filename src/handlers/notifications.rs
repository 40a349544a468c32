use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::models::{Notification, User};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{AppPath, AppQuery};
use crate::utils::response::{message, no_content, success};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// Notifications are private to their recipient.
async fn load_own(state: &AppState, user: &User, id: i32) -> Result<Notification, AppError> {
    let notification = state
        .storage
        .get_notification(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
    if notification.user_id != user.id {
        return Err(AppError::permission_denied());
    }
    Ok(notification)
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<NotificationQuery>,
) -> Result<Response, AppError> {
    Ok(success(
        state
            .storage
            .notifications_for(user.id, query.unread_only)
            .await?,
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    load_own(&state, &user, id).await?;
    let updated = state
        .storage
        .mark_notification_read(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
    Ok(success(updated))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    let count = state.storage.mark_all_notifications_read(user.id).await?;
    Ok(message(format!("Marked {count} notification(s) as read")))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    load_own(&state, &user, id).await?;
    state.storage.delete_notification(id).await?;
    Ok(no_content())
}
