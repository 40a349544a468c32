use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use super::{load_event, notify, reject_fields};
use crate::auth::{require_owner_or_admin, CurrentUser};
use crate::models::review::{is_valid_rating, MAX_RATING, MIN_RATING};
use crate::models::{NewNotification, NewReview, Review, ReviewChanges};
use crate::state::AppState;
use crate::utils::error::{AppError, FieldError};
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{created, no_content, success};

fn rating_errors(rating: Option<i32>) -> Vec<FieldError> {
    match rating {
        Some(r) if !is_valid_rating(r) => vec![FieldError::new(
            "rating",
            format!("must be between {MIN_RATING} and {MAX_RATING}"),
        )],
        _ => Vec::new(),
    }
}

async fn load_review(state: &AppState, id: i32) -> Result<Review, AppError> {
    state
        .storage
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
}

pub async fn event_reviews(
    State(state): State<AppState>,
    AppPath(event_id): AppPath<i32>,
) -> Result<Response, AppError> {
    load_event(&state, event_id).await?;
    Ok(success(state.storage.reviews_by_event(event_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(event_id): AppPath<i32>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> Result<Response, AppError> {
    reject_fields(rating_errors(Some(payload.rating)))?;
    let event = load_event(&state, event_id).await?;

    let review = state
        .storage
        .create_review(NewReview {
            event_id,
            user_id: user.id,
            rating: payload.rating,
            comment: payload.comment,
        })
        .await?;
    tracing::info!(review_id = review.id, event_id, user_id = user.id, "Review created");

    notify(
        state.storage.as_ref(),
        NewNotification::review(event.creator_id, review.id, review.rating, &event.title),
    )
    .await;

    Ok(created(review))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewUpdate {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

pub async fn update_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<ReviewUpdate>,
) -> Result<Response, AppError> {
    let review = load_review(&state, id).await?;
    require_owner_or_admin(&user, review.user_id)?;
    reject_fields(rating_errors(payload.rating))?;

    let updated = state
        .storage
        .update_review(
            id,
            ReviewChanges {
                rating: payload.rating,
                comment: payload.comment,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;
    Ok(success(updated))
}

pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    let review = load_review(&state, id).await?;
    require_owner_or_admin(&user, review.user_id)?;

    state.storage.delete_review(id).await?;
    tracing::info!(review_id = id, event_id = review.event_id, "Review deleted");
    Ok(no_content())
}
