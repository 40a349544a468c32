use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub event_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewChanges {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

pub fn is_valid_rating(rating: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

/// Aggregate stored on the event: mean rating and review count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i32,
}

impl RatingSummary {
    /// Recomputes the aggregate from every rating of an event.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i32), |(sum, count), r| (sum + i64::from(r), count + 1));

        let average = (count > 0).then(|| sum as f64 / f64::from(count));
        Self { average, count }
    }
}
