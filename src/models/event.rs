use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    pub price: Decimal,
    pub genre: Option<String>,
    pub image_url: String,
    pub capacity: Option<i32>,
    pub is_featured: bool,
    pub creator_id: i32,
    pub published: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
    pub average_rating: Option<f64>,
    pub total_ratings: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Case-insensitive substring match over title, description and location.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        [&self.title, &self.description, &self.location]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        self.genre
            .as_deref()
            .is_some_and(|g| g.eq_ignore_ascii_case(genre))
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    pub price: Decimal,
    pub genre: Option<String>,
    pub image_url: String,
    pub capacity: Option<i32>,
    pub is_featured: bool,
    pub creator_id: i32,
    pub published: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub price: Option<Decimal>,
    pub genre: Option<String>,
    pub image_url: Option<String>,
    pub capacity: Option<i32>,
    pub is_featured: Option<bool>,
    pub published: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
}

impl EventChanges {
    pub fn apply(self, event: &mut Event) {
        let EventChanges {
            title,
            description,
            date,
            time,
            location,
            price,
            genre,
            image_url,
            capacity,
            is_featured,
            published,
            latitude,
            longitude,
            end_date,
            end_time,
        } = self;

        macro_rules! set {
            ($target:ident, $field:ident) => {
                if let Some(value) = $field {
                    $target.$field = value;
                }
            };
            ($target:ident, $field:ident, optional) => {
                if let Some(value) = $field {
                    $target.$field = Some(value);
                }
            };
        }

        set!(event, title);
        set!(event, description);
        set!(event, date);
        set!(event, time);
        set!(event, location);
        set!(event, price);
        set!(event, genre, optional);
        set!(event, image_url);
        set!(event, capacity, optional);
        set!(event, is_featured);
        set!(event, published);
        set!(event, latitude, optional);
        set!(event, longitude, optional);
        set!(event, end_date, optional);
        set!(event, end_time, optional);
    }
}

/// Listing filter for public event queries. Search takes precedence over
/// genre; a genre of `all` is no filter. Only published events are listed.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub featured: Option<bool>,
    pub date: Option<NaiveDate>,
}

impl EventFilter {
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn genre_term(&self) -> Option<&str> {
        if self.search_term().is_some() {
            return None;
        }
        self.genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty() && !g.eq_ignore_ascii_case("all"))
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !event.published {
            return false;
        }
        if let Some(query) = self.search_term() {
            if !event.matches_search(query) {
                return false;
            }
        }
        if let Some(genre) = self.genre_term() {
            if !event.has_genre(genre) {
                return false;
            }
        }
        if let Some(featured) = self.featured {
            if event.is_featured != featured {
                return false;
            }
        }
        if let Some(date) = self.date {
            if event.date != date {
                return false;
            }
        }
        true
    }
}
