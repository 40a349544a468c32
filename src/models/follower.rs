use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Edge from a follower to the organizer they follow.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Follower {
    pub id: i32,
    pub follower_id: i32,
    pub organizer_id: i32,
    pub created_at: DateTime<Utc>,
}
