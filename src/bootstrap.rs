//! Startup tasks that run next to the HTTP server.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AdminBootstrap;
use crate::models::{NewUser, UserRole};
use crate::storage::Storage;
use crate::utils::error::AppError;
use crate::utils::password::hash_password;

pub const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Creates the configured admin when no account exists yet. Returns whether
/// an account was created.
pub async fn ensure_admin(
    storage: &dyn Storage,
    admin: Option<&AdminBootstrap>,
) -> Result<bool, AppError> {
    if storage.count_users().await? > 0 {
        debug!("Users present, skipping admin bootstrap");
        return Ok(false);
    }

    let Some(admin) = admin else {
        warn!("No users exist and ADMIN_USERNAME/ADMIN_EMAIL/ADMIN_PASSWORD are unset");
        return Ok(false);
    };

    let user = storage
        .create_user(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password)?,
            full_name: None,
            role: UserRole::Admin,
            profile_image: None,
            bio: None,
            phone: None,
        })
        .await?;
    info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
    Ok(true)
}

/// Deletes expired sessions every `every` until the runtime shuts down.
pub fn spawn_session_purge(storage: Arc<dyn Storage>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match storage.delete_expired_sessions(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Expired sessions purged"),
                Err(e) => warn!(error = %e, "Session purge failed"),
            }
        }
    })
}
