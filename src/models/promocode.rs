use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use std::str::FromStr;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl FromStr for DiscountType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(UnknownVariant {
                kind: "discount type",
                value: other.to_string(),
            }),
        }
    }
}

text_enum!(DiscountType);

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Promocode {
    pub id: i32,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
    pub max_uses: Option<i32>,
    pub uses_count: i32,
    pub event_id: Option<i32>,
    pub creator_id: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Why a promocode cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PromocodeRejection {
    #[error("promocode does not exist")]
    Unknown,
    #[error("promocode is inactive")]
    Inactive,
    #[error("promocode is not valid yet")]
    NotStarted,
    #[error("promocode has expired")]
    Expired,
    #[error("promocode usage limit reached")]
    Exhausted,
    #[error("promocode is not valid for this event")]
    WrongEvent,
}

impl Promocode {
    /// True while the code still has redemptions left. A missing or
    /// non-positive `max_uses` means unlimited.
    pub fn has_uses_left(&self) -> bool {
        match self.max_uses {
            Some(max) if max > 0 => self.uses_count < max,
            _ => true,
        }
    }

    /// Checks activity, the `[start_date, end_date]` window, the usage cap
    /// and the event scope. The event scope only applies when both the
    /// promocode and the caller name an event.
    pub fn check_usable(
        &self,
        event_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<(), PromocodeRejection> {
        if !self.is_active {
            return Err(PromocodeRejection::Inactive);
        }
        if self.end_date.is_some_and(|end| end < now) {
            return Err(PromocodeRejection::Expired);
        }
        if self.start_date.is_some_and(|start| start > now) {
            return Err(PromocodeRejection::NotStarted);
        }
        if !self.has_uses_left() {
            return Err(PromocodeRejection::Exhausted);
        }
        if let (Some(scope), Some(requested)) = (self.event_id, event_id) {
            if scope != requested {
                return Err(PromocodeRejection::WrongEvent);
            }
        }
        Ok(())
    }

    /// Discount applied to `subtotal`, never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            // the rate is at most 1, so this never grows past the subtotal
            DiscountType::Percentage => subtotal * (self.discount_amount / Decimal::ONE_HUNDRED),
            DiscountType::Fixed => self.discount_amount,
        };
        raw.max(Decimal::ZERO).min(subtotal).round_dp(2)
    }
}

/// Looks up the outcome of validating `code` against an optional event.
pub fn validate(
    found: Option<Promocode>,
    event_id: Option<i32>,
    now: DateTime<Utc>,
) -> Result<Promocode, PromocodeRejection> {
    let promocode = found.ok_or(PromocodeRejection::Unknown)?;
    promocode.check_usable(event_id, now)?;
    Ok(promocode)
}

#[derive(Debug, Clone)]
pub struct NewPromocode {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
    pub max_uses: Option<i32>,
    pub event_id: Option<i32>,
    pub creator_id: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}
