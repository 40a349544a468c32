use axum::extract::State;
use axum::response::Response;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{is_blank, load_event, reject_fields};
use crate::auth::{require_owner_or_admin, require_role, CurrentUser, ORGANIZERS};
use crate::models::{EventChanges, EventFilter, NewEvent};
use crate::state::AppState;
use crate::utils::error::{AppError, FieldError};
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::response::{created, no_content, success};

/// Ceiling for a ticket price; keeps order totals well inside `Decimal`.
const MAX_EVENT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

const DEFAULT_UPCOMING_LIMIT: i64 = 10;
const MAX_UPCOMING_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub featured: Option<bool>,
    pub date: Option<NaiveDate>,
}

impl From<EventQuery> for EventFilter {
    fn from(query: EventQuery) -> Self {
        EventFilter {
            search: query.search,
            genre: query.genre,
            featured: query.featured,
            date: query.date,
        }
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventQuery>,
) -> Result<Response, AppError> {
    let events = state.storage.list_events(&query.into()).await?;
    Ok(success(events))
}

pub async fn featured_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let filter = EventFilter {
        featured: Some(true),
        ..Default::default()
    };
    Ok(success(state.storage.list_events(&filter).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<i64>,
}

pub async fn upcoming_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UpcomingQuery>,
) -> Result<Response, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_UPCOMING_LIMIT)
        .clamp(1, MAX_UPCOMING_LIMIT);
    let today = Utc::now().date_naive();
    Ok(success(state.storage.upcoming_events(today, limit).await?))
}

pub async fn get_event(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    Ok(success(load_event(&state, id).await?))
}

pub async fn my_events(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    require_role(&user, ORGANIZERS)?;
    Ok(success(state.storage.events_by_creator(user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    pub price: Decimal,
    pub genre: Option<String>,
    pub image_url: String,
    pub capacity: Option<i32>,
    #[serde(default)]
    pub is_featured: bool,
    pub published: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("time", &self.time),
            ("location", &self.location),
            ("imageUrl", &self.image_url),
        ] {
            if is_blank(value) {
                errors.push(FieldError::new(field, "is required"));
            }
        }
        errors.extend(common_event_errors(
            Some(self.price),
            self.capacity,
            Some(self.date),
            self.end_date,
            self.latitude,
            self.longitude,
        ));
        reject_fields(errors)
    }

    fn into_new_event(self, creator_id: i32) -> NewEvent {
        NewEvent {
            title: self.title.trim().to_string(),
            description: self.description,
            date: self.date,
            time: self.time,
            location: self.location,
            price: self.price.round_dp(2),
            genre: self.genre.filter(|g| !is_blank(g)),
            image_url: self.image_url,
            capacity: self.capacity,
            is_featured: self.is_featured,
            creator_id,
            published: self.published.unwrap_or(true),
            latitude: self.latitude,
            longitude: self.longitude,
            end_date: self.end_date,
            end_time: self.end_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
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

impl UpdateEventRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("time", &self.time),
            ("location", &self.location),
            ("imageUrl", &self.image_url),
        ] {
            if value.as_deref().is_some_and(is_blank) {
                errors.push(FieldError::new(field, "must not be empty"));
            }
        }
        errors.extend(common_event_errors(
            self.price,
            self.capacity,
            self.date,
            self.end_date,
            self.latitude,
            self.longitude,
        ));
        reject_fields(errors)
    }

    fn into_changes(self) -> EventChanges {
        EventChanges {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description,
            date: self.date,
            time: self.time,
            location: self.location,
            price: self.price.map(|p| p.round_dp(2)),
            genre: self.genre,
            image_url: self.image_url,
            capacity: self.capacity,
            is_featured: self.is_featured,
            published: self.published,
            latitude: self.latitude,
            longitude: self.longitude,
            end_date: self.end_date,
            end_time: self.end_time,
        }
    }
}

fn common_event_errors(
    price: Option<Decimal>,
    capacity: Option<i32>,
    date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match price {
        Some(p) if p < Decimal::ZERO => {
            errors.push(FieldError::new("price", "must not be negative"));
        }
        Some(p) if p > MAX_EVENT_PRICE => {
            errors.push(FieldError::new(
                "price",
                format!("must be at most {MAX_EVENT_PRICE}"),
            ));
        }
        _ => {}
    }
    if capacity.is_some_and(|c| c <= 0) {
        errors.push(FieldError::new("capacity", "must be greater than zero"));
    }
    if let (Some(start), Some(end)) = (date, end_date) {
        if end < start {
            errors.push(FieldError::new("endDate", "must not be before the start date"));
        }
    }
    if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        errors.push(FieldError::new("latitude", "must be between -90 and 90"));
    }
    if longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
        errors.push(FieldError::new("longitude", "must be between -180 and 180"));
    }
    errors
}

pub async fn create_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CreateEventRequest>,
) -> Result<Response, AppError> {
    require_role(&user, ORGANIZERS)?;
    payload.validate()?;

    let event = state
        .storage
        .create_event(payload.into_new_event(user.id))
        .await?;
    tracing::info!(event_id = event.id, creator_id = user.id, "Event created");
    Ok(created(event))
}

pub async fn update_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateEventRequest>,
) -> Result<Response, AppError> {
    let event = load_event(&state, id).await?;
    require_owner_or_admin(&user, event.creator_id)?;
    payload.validate()?;

    // the stored start date still bounds a lone end date update
    if let (None, Some(end)) = (payload.date, payload.end_date) {
        if end < event.date {
            return Err(AppError::InvalidFields(vec![FieldError::new(
                "endDate",
                "must not be before the start date",
            )]));
        }
    }

    let updated = state
        .storage
        .update_event(id, payload.into_changes())
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    tracing::info!(event_id = id, user_id = user.id, "Event updated");
    Ok(success(updated))
}

pub async fn delete_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    let event = load_event(&state, id).await?;
    require_owner_or_admin(&user, event.creator_id)?;

    state.storage.delete_event(id).await?;
    tracing::info!(event_id = id, user_id = user.id, "Event deleted");
    Ok(no_content())
}

pub async fn event_purchases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    let event = load_event(&state, id).await?;
    require_owner_or_admin(&user, event.creator_id)?;
    Ok(success(state.storage.purchases_by_event(id).await?))
}

pub async fn event_promocodes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    let event = load_event(&state, id).await?;
    require_owner_or_admin(&user, event.creator_id)?;
    Ok(success(state.storage.promocodes_by_event(id).await?))
}
