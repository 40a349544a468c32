use axum::response::Response;
use serde::Serialize;

use crate::models::{Event, NewNotification};
use crate::state::AppState;
use crate::storage::Storage;
use crate::utils::error::{AppError, FieldError};
use crate::utils::response::success;

pub mod auth;
pub mod events;
pub mod followers;
pub mod notifications;
pub mod promocodes;
pub mod purchases;
pub mod reviews;
pub mod users;
pub mod wishlist;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    success(HealthPayload {
        status: "ok",
        service: "ticketing-api",
    })
}

/// Turns collected field errors into a 400 listing every rejected field.
pub(crate) fn reject_fields(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidFields(errors))
    }
}

pub(crate) async fn load_event(state: &AppState, id: i32) -> Result<Event, AppError> {
    state
        .storage
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

/// Notifications are a side effect of an already committed change, so a
/// failure here is logged instead of failing the request.
pub(crate) async fn notify(storage: &dyn Storage, notification: NewNotification) {
    let user_id = notification.user_id;
    let kind = notification.kind;
    if let Err(e) = storage.create_notification(notification).await {
        tracing::warn!(user_id, %kind, error = %e, "Failed to record notification");
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("jane.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("jane@.com"));
        assert!(!is_valid_email("jane doe@example.com"));
    }

    #[test]
    fn test_reject_fields() {
        assert!(reject_fields(Vec::new()).is_ok());
        let err = reject_fields(vec![FieldError::new("title", "is required")]).unwrap_err();
        assert!(matches!(err, AppError::InvalidFields(fields) if fields.len() == 1));
    }
}
