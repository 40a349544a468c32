use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{is_blank, load_event, notify, reject_fields};
use crate::auth::{require_owner_or_admin, require_role, CurrentUser, ORGANIZERS};
use crate::models::{NewNotification, NewPurchase, Purchase, PurchaseStatus, User};
use crate::state::AppState;
use crate::utils::error::{AppError, FieldError};
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{created, success};

pub(crate) const MAX_TICKETS_PER_PURCHASE: i32 = 100;

fn purchase_not_found() -> AppError {
    AppError::NotFound("Purchase not found".to_string())
}

async fn load_purchase(state: &AppState, id: i32) -> Result<Purchase, AppError> {
    state
        .storage
        .get_purchase(id)
        .await?
        .ok_or_else(purchase_not_found)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub event_id: i32,
    pub quantity: i32,
    pub promocode: Option<String>,
}

impl PurchaseRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if !(1..=MAX_TICKETS_PER_PURCHASE).contains(&self.quantity) {
            errors.push(FieldError::new(
                "quantity",
                format!("must be between 1 and {MAX_TICKETS_PER_PURCHASE}"),
            ));
        }
        reject_fields(errors)
    }
}

#[derive(Serialize)]
struct PurchaseCreated {
    message: &'static str,
    purchase: Purchase,
}

pub async fn create_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<PurchaseRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let event = load_event(&state, payload.event_id).await?;
    if !event.published {
        return Err(AppError::ValidationError(
            "Event is not available for purchase".to_string(),
        ));
    }

    let promocode = payload
        .promocode
        .map(|code| code.trim().to_string())
        .filter(|code| !is_blank(code));

    let purchase = state
        .storage
        .create_purchase(
            NewPurchase {
                event_id: event.id,
                user_id: user.id,
                quantity: payload.quantity,
                promocode,
            },
            Utc::now(),
        )
        .await?;
    tracing::info!(
        purchase_id = purchase.id,
        event_id = event.id,
        user_id = user.id,
        quantity = purchase.quantity,
        total = %purchase.total_amount,
        "Tickets purchased"
    );

    notify(
        state.storage.as_ref(),
        NewNotification::purchase(user.id, purchase.id, purchase.quantity, &event.title),
    )
    .await;

    Ok(created(PurchaseCreated {
        message: "Purchase successful",
        purchase,
    }))
}

pub async fn my_purchases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    Ok(success(state.storage.purchases_by_user(user.id).await?))
}

/// The buyer, the organizer of the event and admins may see a purchase.
async fn ensure_can_view(state: &AppState, user: &User, purchase: &Purchase) -> Result<(), AppError> {
    if purchase.user_id == user.id || user.is_admin() {
        return Ok(());
    }
    let event = load_event(state, purchase.event_id).await?;
    require_owner_or_admin(user, event.creator_id)
}

pub async fn get_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    let purchase = load_purchase(&state, id).await?;
    ensure_can_view(&state, &user, &purchase).await?;
    Ok(success(purchase))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    pub ticket_code: String,
    pub qr_code_url: String,
    pub is_checked_in: bool,
}

impl From<&Purchase> for TicketView {
    fn from(purchase: &Purchase) -> Self {
        Self {
            ticket_code: purchase.ticket_code.clone(),
            qr_code_url: purchase.qr_code_url(),
            is_checked_in: purchase.is_checked_in,
        }
    }
}

pub async fn get_ticket(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Response, AppError> {
    let purchase = load_purchase(&state, id).await?;
    require_owner_or_admin(&user, purchase.user_id)?;
    Ok(success(TicketView::from(&purchase)))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: PurchaseStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<StatusUpdate>,
) -> Result<Response, AppError> {
    let purchase = load_purchase(&state, id).await?;
    let event = load_event(&state, purchase.event_id).await?;
    require_owner_or_admin(&user, event.creator_id)?;

    let updated = state
        .storage
        .update_purchase_status(id, payload.status)
        .await?
        .ok_or_else(purchase_not_found)?;
    tracing::info!(
        purchase_id = id,
        from = %purchase.status,
        to = %updated.status,
        "Purchase status changed"
    );
    Ok(success(updated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub ticket_code: String,
}

pub async fn check_in(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CheckInRequest>,
) -> Result<Response, AppError> {
    require_role(&user, ORGANIZERS)?;
    let code = payload.ticket_code.trim();
    if code.is_empty() {
        return Err(AppError::InvalidFields(vec![FieldError::new(
            "ticketCode",
            "is required",
        )]));
    }

    let purchase = state
        .storage
        .purchase_by_ticket_code(code)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    let event = load_event(&state, purchase.event_id).await?;
    require_owner_or_admin(&user, event.creator_id)?;

    let checked = state.storage.check_in_ticket(code, Utc::now()).await?;
    tracing::info!(purchase_id = checked.id, event_id = event.id, "Ticket checked in");
    Ok(success(checked))
}
