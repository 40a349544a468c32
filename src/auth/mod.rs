//! Session authentication.
//!
//! Login stores an opaque token in the `sessions` table and hands it to the
//! browser in the `sid` cookie. [`CurrentUser`] resolves the cookie back to a
//! user on every protected request and rejects with 401 otherwise.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use uuid::Uuid;

use crate::models::User;
use crate::state::AppState;
use crate::utils::error::AppError;

pub mod cookie;
pub mod policy;

pub use cookie::{clear_session_cookie, session_cookie, session_token, SESSION_COOKIE};
pub use policy::{require_owner_or_admin, require_role, ADMINS, ORGANIZERS};

/// The authenticated user behind the request's session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(AppError::unauthenticated)?;
        let user = state
            .storage
            .session_user(&token, Utc::now())
            .await?
            .ok_or_else(AppError::unauthenticated)?;
        Ok(CurrentUser(user))
    }
}

/// Opens a session for `user_id` and returns the `Set-Cookie` value.
pub async fn start_session(state: &AppState, user_id: i32) -> Result<String, AppError> {
    let token = Uuid::new_v4().simple().to_string();
    let ttl = state.config.session_ttl;
    state
        .storage
        .create_session(&token, user_id, Utc::now() + ttl)
        .await?;
    tracing::debug!(user_id, "Session started");
    Ok(session_cookie(&token, ttl, state.config.production))
}
