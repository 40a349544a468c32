//! Role and ownership checks applied after the session is resolved.

use crate::models::{User, UserRole};
use crate::utils::error::AppError;

pub const ORGANIZERS: &[UserRole] = &[UserRole::Organizer, UserRole::Admin];
pub const ADMINS: &[UserRole] = &[UserRole::Admin];

pub fn require_role(user: &User, allowed: &[UserRole]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::permission_denied())
    }
}

/// Passes for the owner of a resource and for any admin.
pub fn require_owner_or_admin(user: &User, owner_id: i32) -> Result<(), AppError> {
    if user.id == owner_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::permission_denied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i32, role: UserRole) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: String::new(),
            full_name: None,
            role,
            profile_image: None,
            bio: None,
            phone: None,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_allow_list() {
        assert!(require_role(&user(1, UserRole::Organizer), ORGANIZERS).is_ok());
        assert!(require_role(&user(1, UserRole::Admin), ORGANIZERS).is_ok());

        let err = require_role(&user(1, UserRole::User), ORGANIZERS).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(require_role(&user(1, UserRole::Organizer), ADMINS).is_err());
    }

    #[test]
    fn test_owner_or_admin() {
        assert!(require_owner_or_admin(&user(4, UserRole::Organizer), 4).is_ok());
        assert!(require_owner_or_admin(&user(9, UserRole::Admin), 4).is_ok());
        assert!(require_owner_or_admin(&user(5, UserRole::Organizer), 4).is_err());
    }
}
