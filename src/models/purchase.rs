use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

const QR_CODE_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/?size=150x150&data=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Canceled,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Canceled => "canceled",
            PurchaseStatus::Refunded => "refunded",
        }
    }

    /// Whether tickets in this state still occupy event capacity.
    pub fn holds_seats(&self) -> bool {
        matches!(self, PurchaseStatus::Pending | PurchaseStatus::Completed)
    }
}

impl FromStr for PurchaseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseStatus::Pending),
            "completed" => Ok(PurchaseStatus::Completed),
            "canceled" => Ok(PurchaseStatus::Canceled),
            "refunded" => Ok(PurchaseStatus::Refunded),
            other => Err(UnknownVariant {
                kind: "purchase status",
                value: other.to_string(),
            }),
        }
    }
}

text_enum!(PurchaseStatus);

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub quantity: i32,
    pub total_amount: Decimal,
    pub status: PurchaseStatus,
    pub ticket_code: String,
    pub promocode_id: Option<i32>,
    pub discount_amount: Option<Decimal>,
    pub is_checked_in: bool,
    pub check_in_date: Option<DateTime<Utc>>,
    pub purchase_date: DateTime<Utc>,
}

impl Purchase {
    pub fn qr_code_url(&self) -> String {
        qr_code_url(&self.ticket_code)
    }
}

/// Opaque, unguessable code printed on the ticket and scanned at check-in.
pub fn generate_ticket_code() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn qr_code_url(ticket_code: &str) -> String {
    format!("{QR_CODE_ENDPOINT}{ticket_code}")
}

/// Purchase request as seen by storage. Totals are computed during the
/// purchase from the event price and the redeemed promocode.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub event_id: i32,
    pub user_id: i32,
    pub quantity: i32,
    pub promocode: Option<String>,
}

/// Amounts charged for `quantity` tickets at `unit_price` after `discount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl PriceBreakdown {
    /// `None` when the subtotal does not fit in a `Decimal`.
    pub fn compute(
        unit_price: Decimal,
        quantity: i32,
        promocode: Option<&super::Promocode>,
    ) -> Option<Self> {
        let subtotal = unit_price.checked_mul(Decimal::from(quantity))?.round_dp(2);
        let discount = promocode
            .map(|p| p.discount_for(subtotal))
            .unwrap_or(Decimal::ZERO);
        Some(Self {
            subtotal,
            discount,
            total: subtotal - discount,
        })
    }
}

/// Seats left once `held` seats are taken. `None` capacity is unlimited.
pub fn seats_remaining(capacity: Option<i32>, held: i64) -> Option<i64> {
    capacity.map(|cap| (i64::from(cap) - held).max(0))
}
