/// Error returned when a stored or submitted string is not a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements serde and sqlx support for a fieldless enum stored as TEXT.
/// The enum must provide `as_str` and a `FromStr` impl yielding
/// [`UnknownVariant`].
macro_rules! text_enum {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(raw.parse()?)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub mod event;
pub mod follower;
pub mod notification;
pub mod promocode;
pub mod purchase;
pub mod review;
pub mod user;
pub mod wishlist;

pub use event::{Event, EventChanges, EventFilter, NewEvent};
pub use follower::Follower;
pub use notification::{NewNotification, Notification, NotificationKind};
pub use promocode::{DiscountType, NewPromocode, Promocode, PromocodeRejection};
pub use purchase::{NewPurchase, PriceBreakdown, Purchase, PurchaseStatus};
pub use review::{NewReview, RatingSummary, Review, ReviewChanges};
pub use user::{NewUser, User, UserChanges, UserRole};
pub use wishlist::Wishlist;

