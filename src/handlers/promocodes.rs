use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::purchases::MAX_TICKETS_PER_PURCHASE;
use super::{is_blank, load_event, reject_fields};
use crate::auth::{require_owner_or_admin, require_role, CurrentUser, ORGANIZERS};
use crate::models::promocode;
use crate::models::{DiscountType, NewPromocode, PriceBreakdown, Promocode};
use crate::state::AppState;
use crate::storage::{order_too_large, INVALID_PROMOCODE};
use crate::utils::error::{AppError, FieldError};
use crate::utils::extract::AppJson;
use crate::utils::response::{created, success};

const MAX_CODE_LEN: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromocodeRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
    pub max_uses: Option<i32>,
    pub event_id: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CreatePromocodeRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        let code = self.code.trim();
        if code.is_empty() || code.chars().count() > MAX_CODE_LEN || code.contains(char::is_whitespace)
        {
            errors.push(FieldError::new(
                "code",
                format!("must be 1 to {MAX_CODE_LEN} characters without spaces"),
            ));
        }

        let amount = self.discount_amount;
        match self.discount_type {
            DiscountType::Percentage if amount <= Decimal::ZERO || amount > Decimal::ONE_HUNDRED => {
                errors.push(FieldError::new(
                    "discountAmount",
                    "percentage must be greater than 0 and at most 100",
                ));
            }
            DiscountType::Fixed if amount <= Decimal::ZERO => {
                errors.push(FieldError::new(
                    "discountAmount",
                    "fixed discount must be greater than 0",
                ));
            }
            _ => {}
        }

        if self.max_uses.is_some_and(|max| max < 0) {
            errors.push(FieldError::new("maxUses", "must not be negative"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                errors.push(FieldError::new("endDate", "must not be before the start date"));
            }
        }
        reject_fields(errors)
    }
}

pub async fn create_promocode(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CreatePromocodeRequest>,
) -> Result<Response, AppError> {
    require_role(&user, ORGANIZERS)?;
    payload.validate()?;

    if let Some(event_id) = payload.event_id {
        let event = load_event(&state, event_id).await?;
        require_owner_or_admin(&user, event.creator_id)?;
    }

    let promocode = state
        .storage
        .create_promocode(NewPromocode {
            code: payload.code.trim().to_string(),
            discount_type: payload.discount_type,
            discount_amount: payload.discount_amount.round_dp(2),
            max_uses: payload.max_uses,
            event_id: payload.event_id,
            creator_id: user.id,
            start_date: payload.start_date,
            end_date: payload.end_date,
            is_active: payload.is_active.unwrap_or(true),
        })
        .await?;
    tracing::info!(promocode_id = promocode.id, creator_id = user.id, "Promocode created");
    Ok(created(promocode))
}

pub async fn my_promocodes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    require_role(&user, ORGANIZERS)?;
    Ok(success(state.storage.promocodes_by_creator(user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromocodeRequest {
    pub code: String,
    pub event_id: Option<i32>,
    pub quantity: Option<i32>,
}

impl ValidatePromocodeRequest {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if is_blank(&self.code) {
            errors.push(FieldError::new("code", "is required"));
        }
        if self
            .quantity
            .is_some_and(|q| !(1..=MAX_TICKETS_PER_PURCHASE).contains(&q))
        {
            errors.push(FieldError::new(
                "quantity",
                format!("must be between 1 and {MAX_TICKETS_PER_PURCHASE}"),
            ));
        }
        reject_fields(errors)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromocodeQuote {
    pub promocode: Promocode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
}

impl PromocodeQuote {
    fn new(promocode: Promocode, breakdown: Option<PriceBreakdown>) -> Self {
        Self {
            subtotal: breakdown.map(|b| b.subtotal),
            discount: breakdown.map(|b| b.discount),
            total: breakdown.map(|b| b.total),
            promocode,
        }
    }
}

/// Checks a code without redeeming it. With an event and quantity the
/// response also quotes the discounted price.
pub async fn validate_promocode(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    AppJson(payload): AppJson<ValidatePromocodeRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;
    let code = payload.code.trim();

    let found = state.storage.promocode_by_code(code).await?;
    let promocode = promocode::validate(found, payload.event_id, Utc::now()).map_err(|reason| {
        tracing::debug!(code, %reason, "Promocode rejected");
        AppError::NotFound(INVALID_PROMOCODE.to_string())
    })?;

    let breakdown = match (payload.event_id, payload.quantity) {
        (Some(event_id), Some(quantity)) => {
            let event = load_event(&state, event_id).await?;
            Some(
                PriceBreakdown::compute(event.price, quantity, Some(&promocode))
                    .ok_or_else(order_too_large)?,
            )
        }
        _ => None,
    };

    Ok(success(PromocodeQuote::new(promocode, breakdown)))
}
