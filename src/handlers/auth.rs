use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::{is_blank, is_valid_email, reject_fields};
use crate::auth::{clear_session_cookie, session_token, start_session, CurrentUser};
use crate::models::{NewUser, UserRole};
use crate::state::AppState;
use crate::storage::{EMAIL_TAKEN, USERNAME_TAKEN};
use crate::utils::error::{AppError, FieldError};
use crate::utils::extract::AppJson;
use crate::utils::password::{hash_password, verify_password};
use crate::utils::response::{message, success};

pub(crate) const MIN_USERNAME_LEN: usize = 3;
pub(crate) const MAX_USERNAME_LEN: usize = 32;
pub(crate) const MIN_PASSWORD_LEN: usize = 6;

const BAD_CREDENTIALS: &str = "Incorrect username or password";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        reject_fields(account_field_errors(
            &self.username,
            &self.email,
            &self.password,
        ))
    }
}

pub(crate) fn account_field_errors(username: &str, email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let username_len = username.trim().chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username_len) {
        errors.push(FieldError::new(
            "username",
            format!("must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"),
        ));
    }
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }
    if let Some(error) = password_error("password", password) {
        errors.push(error);
    }
    errors
}

pub(crate) fn password_error(field: &'static str, password: &str) -> Option<FieldError> {
    (password.chars().count() < MIN_PASSWORD_LEN).then(|| {
        FieldError::new(
            field,
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        )
    })
}

/// Rejects a username or email that already belongs to an account.
pub(crate) async fn ensure_account_is_free(
    state: &AppState,
    username: &str,
    email: &str,
) -> Result<(), AppError> {
    if state.storage.get_user_by_username(username).await?.is_some() {
        return Err(AppError::ValidationError(USERNAME_TAKEN.to_string()));
    }
    if state.storage.get_user_by_email(email).await?.is_some() {
        return Err(AppError::ValidationError(EMAIL_TAKEN.to_string()));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let role = payload.role.unwrap_or(UserRole::User);
    if role == UserRole::Admin {
        return Err(AppError::Forbidden(
            "Cannot register with the admin role".to_string(),
        ));
    }

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();
    ensure_account_is_free(&state, &username, &email).await?;

    let user = state
        .storage
        .create_user(NewUser {
            username,
            email,
            password_hash: hash_password(&payload.password)?,
            full_name: payload.full_name.filter(|v| !is_blank(v)),
            role,
            profile_image: payload.profile_image,
            bio: payload.bio,
            phone: payload.phone,
        })
        .await?;
    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    let cookie = start_session(&state, user.id).await?;
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(user)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Response, AppError> {
    let found = state
        .storage
        .get_user_by_username(payload.username.trim())
        .await?;

    let Some(mut user) = found.filter(|u| verify_password(&payload.password, &u.password_hash))
    else {
        return Err(AppError::AuthError(BAD_CREDENTIALS.to_string()));
    };

    let now = Utc::now();
    state.storage.update_last_login(user.id, now).await?;
    user.last_login = Some(now);
    tracing::info!(user_id = user.id, "User logged in");

    let cookie = start_session(&state, user.id).await?;
    Ok(([(header::SET_COOKIE, cookie)], Json(user)).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        state.storage.delete_session(&token).await?;
    }
    let cookie = clear_session_cookie(state.config.production);
    Ok(([(header::SET_COOKIE, cookie)], message("Logged out successfully")).into_response())
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Response {
    success(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_validation_lists_every_bad_field() {
        let errors = account_field_errors("ab", "not-an-email", "123");
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["username", "email", "password"]);
    }

    #[test]
    fn test_account_validation_accepts_good_input() {
        assert!(account_field_errors("jane_doe", "jane@example.com", "hunter22").is_empty());
        assert_eq!(account_field_errors(&"x".repeat(33), "jane@example.com", "hunter22").len(), 1);
    }

    #[test]
    fn test_register_request_is_camel_case() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"username":"jane","email":"jane@example.com","password":"secret1","fullName":"Jane","role":"organizer"}"#,
        )
        .unwrap();
        assert_eq!(request.full_name.as_deref(), Some("Jane"));
        assert_eq!(request.role, Some(UserRole::Organizer));
    }
}
