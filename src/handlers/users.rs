//! Profile updates for the signed-in user and the admin user console.

use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use super::auth::{account_field_errors, ensure_account_is_free, password_error};
use super::{is_valid_email, reject_fields};
use crate::auth::{require_owner_or_admin, require_role, CurrentUser, ADMINS};
use crate::models::{NewUser, User, UserChanges, UserRole};
use crate::state::AppState;
use crate::utils::error::{AppError, FieldError};
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::password::{hash_password, verify_password};
use crate::utils::response::{created, message, no_content, success};

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

fn email_errors(email: Option<&str>) -> Vec<FieldError> {
    match email {
        Some(email) if !is_valid_email(email) => {
            vec![FieldError::new("email", "must be a valid email address")]
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    fn into_changes(self) -> Result<UserChanges, AppError> {
        reject_fields(email_errors(self.email.as_deref()))?;
        Ok(UserChanges {
            email: self.email.map(|e| e.trim().to_string()),
            full_name: self.full_name,
            profile_image: self.profile_image,
            bio: self.bio,
            phone: self.phone,
            ..Default::default()
        })
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<ProfileUpdate>,
) -> Result<Response, AppError> {
    require_owner_or_admin(&user, id)?;
    let changes = payload.into_changes()?;

    let updated = state
        .storage
        .update_user(id, changes)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(success(updated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<PasswordChange>,
) -> Result<Response, AppError> {
    if user.id != id {
        return Err(AppError::permission_denied());
    }
    reject_fields(password_error("newPassword", &payload.new_password).into_iter().collect())?;

    if !verify_password(&payload.current_password, &user.password_hash) {
        return Err(AppError::ValidationError(
            "Current password is incorrect".to_string(),
        ));
    }

    let changes = UserChanges {
        password_hash: Some(hash_password(&payload.new_password)?),
        ..Default::default()
    };
    state
        .storage
        .update_user(id, changes)
        .await?
        .ok_or_else(user_not_found)?;
    tracing::info!(user_id = id, "Password changed");
    Ok(message("Password updated successfully"))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub search: Option<String>,
}

pub async fn admin_list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<UserSearch>,
) -> Result<Response, AppError> {
    require_role(&user, ADMINS)?;

    let users: Vec<User> = match query.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => state.storage.search_users(term).await?,
        _ => state.storage.list_users().await?,
    };
    Ok(success(users))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
}

pub async fn admin_create_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    AppJson(payload): AppJson<AdminCreateUser>,
) -> Result<Response, AppError> {
    require_role(&admin, ADMINS)?;
    reject_fields(account_field_errors(
        &payload.username,
        &payload.email,
        &payload.password,
    ))?;

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();
    ensure_account_is_free(&state, &username, &email).await?;

    let user = state
        .storage
        .create_user(NewUser {
            username,
            email,
            password_hash: hash_password(&payload.password)?,
            full_name: payload.full_name,
            role: payload.role.unwrap_or(UserRole::User),
            profile_image: payload.profile_image,
            bio: payload.bio,
            phone: payload.phone,
        })
        .await?;
    tracing::info!(admin_id = admin.id, user_id = user.id, role = %user.role, "User created by admin");
    Ok(created(user))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

impl AdminUserUpdate {
    fn into_changes(self) -> Result<UserChanges, AppError> {
        let mut errors = email_errors(self.email.as_deref());
        if let Some(password) = self.password.as_deref() {
            errors.extend(password_error("password", password));
        }
        reject_fields(errors)?;

        let password_hash = self.password.as_deref().map(hash_password).transpose()?;
        Ok(UserChanges {
            email: self.email.map(|e| e.trim().to_string()),
            full_name: self.full_name,
            role: self.role,
            profile_image: self.profile_image,
            bio: self.bio,
            phone: self.phone,
            password_hash,
        })
    }
}

pub async fn admin_update_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<AdminUserUpdate>,
) -> Result<Response, AppError> {
    require_role(&admin, ADMINS)?;
    let changes = payload.into_changes()?;

    let updated = state
        .storage
        .update_user(id, changes)
        .await?
        .ok_or_else(user_not_found)?;
    tracing::info!(admin_id = admin.id, user_id = id, "User updated by admin");
    Ok(success(updated))
}

pub async fn admin_delete_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    require_role(&admin, ADMINS)?;
    if admin.id == id {
        return Err(AppError::ValidationError(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !state.storage.delete_user(id).await? {
        return Err(user_not_found());
    }
    tracing::info!(admin_id = admin.id, user_id = id, "User deleted");
    Ok(no_content())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_rejects_bad_email() {
        let update = ProfileUpdate {
            email: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(
            update.into_changes(),
            Err(AppError::InvalidFields(_))
        ));
    }

    #[test]
    fn test_profile_update_never_changes_role_or_password() {
        let changes = ProfileUpdate {
            bio: Some("Hello".into()),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        assert!(changes.role.is_none());
        assert!(changes.password_hash.is_none());
        assert_eq!(changes.bio.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_admin_update_hashes_new_password() {
        let changes = AdminUserUpdate {
            password: Some("brand-new".into()),
            role: Some(UserRole::Organizer),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        let hash = changes.password_hash.unwrap();
        assert!(verify_password("brand-new", &hash));
        assert_eq!(changes.role, Some(UserRole::Organizer));
    }

    #[test]
    fn test_admin_update_rejects_short_password() {
        let result = AdminUserUpdate {
            password: Some("abc".into()),
            ..Default::default()
        }
        .into_changes();
        assert!(matches!(result, Err(AppError::InvalidFields(f)) if f[0].field == "password"));
    }
}
