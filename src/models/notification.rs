use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::str::FromStr;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Purchase,
    Review,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Purchase => "purchase",
            NotificationKind::Review => "review",
            NotificationKind::Follow => "follow",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(NotificationKind::Purchase),
            "review" => Ok(NotificationKind::Review),
            "follow" => Ok(NotificationKind::Follow),
            other => Err(UnknownVariant {
                kind: "notification type",
                value: other.to_string(),
            }),
        }
    }
}

text_enum!(NotificationKind);

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub related_id: Option<i32>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i32,
    pub kind: NotificationKind,
    pub message: String,
    pub related_id: Option<i32>,
}

impl NewNotification {
    pub fn purchase(user_id: i32, purchase_id: i32, quantity: i32, event_title: &str) -> Self {
        Self {
            user_id,
            kind: NotificationKind::Purchase,
            message: format!(
                "You have successfully purchased {quantity} ticket(s) for \"{event_title}\"."
            ),
            related_id: Some(purchase_id),
        }
    }

    pub fn review(organizer_id: i32, review_id: i32, rating: i32, event_title: &str) -> Self {
        Self {
            user_id: organizer_id,
            kind: NotificationKind::Review,
            message: format!(
                "Someone left a {rating}-star review for your event \"{event_title}\"."
            ),
            related_id: Some(review_id),
        }
    }

    pub fn follow(organizer_id: i32, follower_id: i32, follower_name: &str) -> Self {
        Self {
            user_id: organizer_id,
            kind: NotificationKind::Follow,
            message: format!("{follower_name} is now following you."),
            related_id: Some(follower_id),
        }
    }
}
