use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub id: i32,
    pub user_id: i32,
    pub event_id: i32,
    pub created_at: DateTime<Utc>,
}
