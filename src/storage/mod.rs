//! Persistence for every marketplace entity.
//!
//! Handlers only see [`Storage`]. Two backends implement it:
//! [`PgStorage`] over a Postgres pool and [`MemoryStorage`] for development
//! without a database and for the HTTP test suite. Both enforce the same
//! rules: ratings are recomputed from the review set after every change,
//! promocode redemption is a conditional increment, and a purchase never
//! oversells event capacity.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Event, EventChanges, EventFilter, Follower, NewEvent, NewNotification, NewPromocode,
    NewPurchase, NewReview, NewUser, Notification, Promocode, Purchase, PurchaseStatus, Review,
    ReviewChanges, User, UserChanges, Wishlist,
};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

pub type StorageResult<T> = Result<T, AppError>;

pub(crate) const USERNAME_TAKEN: &str = "Username already exists";
pub(crate) const EMAIL_TAKEN: &str = "Email already in use";
pub(crate) const PROMOCODE_TAKEN: &str = "Promocode already exists";
pub(crate) const ALREADY_FOLLOWING: &str = "Already following this organizer";
pub(crate) const ALREADY_IN_WISHLIST: &str = "Event already in wishlist";
pub(crate) const INVALID_PROMOCODE: &str = "Invalid or expired promocode";
pub(crate) const PROMOCODE_EXHAUSTED: &str = "Promocode usage limit reached";
pub(crate) const NOT_ENOUGH_TICKETS: &str = "Not enough tickets available";

pub(crate) fn event_not_found() -> AppError {
    AppError::NotFound("Event not found".to_string())
}

pub(crate) fn order_too_large() -> AppError {
    AppError::ValidationError("Order total is too large".to_string())
}

pub(crate) fn ticket_not_found() -> AppError {
    AppError::NotFound("Ticket not found".to_string())
}

#[async_trait]
pub trait Storage: Send + Sync {
    // Users
    async fn create_user(&self, user: NewUser) -> StorageResult<User>;
    async fn get_user(&self, id: i32) -> StorageResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;
    async fn update_user(&self, id: i32, changes: UserChanges) -> StorageResult<Option<User>>;
    async fn update_last_login(&self, id: i32, at: DateTime<Utc>) -> StorageResult<()>;
    async fn list_users(&self) -> StorageResult<Vec<User>>;
    async fn search_users(&self, query: &str) -> StorageResult<Vec<User>>;
    async fn count_users(&self) -> StorageResult<i64>;
    /// Removes the user together with everything they own. Returns false
    /// when no such user exists.
    async fn delete_user(&self, id: i32) -> StorageResult<bool>;

    // Sessions
    async fn create_session(
        &self,
        token: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;
    /// Resolves an unexpired session to its user.
    async fn session_user(&self, token: &str, now: DateTime<Utc>) -> StorageResult<Option<User>>;
    async fn delete_session(&self, token: &str) -> StorageResult<()>;
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StorageResult<u64>;

    // Events
    async fn list_events(&self, filter: &EventFilter) -> StorageResult<Vec<Event>>;
    async fn get_event(&self, id: i32) -> StorageResult<Option<Event>>;
    async fn events_by_creator(&self, creator_id: i32) -> StorageResult<Vec<Event>>;
    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> StorageResult<Vec<Event>>;
    async fn create_event(&self, event: NewEvent) -> StorageResult<Event>;
    async fn update_event(&self, id: i32, changes: EventChanges) -> StorageResult<Option<Event>>;
    async fn delete_event(&self, id: i32) -> StorageResult<bool>;

    // Purchases
    /// Validates capacity and the optional promocode, redeems the promocode
    /// and records the purchase as one atomic step.
    async fn create_purchase(&self, purchase: NewPurchase, now: DateTime<Utc>)
        -> StorageResult<Purchase>;
    async fn get_purchase(&self, id: i32) -> StorageResult<Option<Purchase>>;
    async fn purchase_by_ticket_code(&self, code: &str) -> StorageResult<Option<Purchase>>;
    async fn purchases_by_event(&self, event_id: i32) -> StorageResult<Vec<Purchase>>;
    async fn purchases_by_user(&self, user_id: i32) -> StorageResult<Vec<Purchase>>;
    /// Changes the status. Moving a purchase back into a seat-holding
    /// status re-checks capacity and fails when the seats are gone.
    async fn update_purchase_status(
        &self,
        id: i32,
        status: PurchaseStatus,
    ) -> StorageResult<Option<Purchase>>;
    /// Marks the ticket as used. Fails when the code is unknown, the
    /// purchase is not completed, or it was already checked in.
    async fn check_in_ticket(&self, code: &str, now: DateTime<Utc>) -> StorageResult<Purchase>;

    // Reviews
    async fn create_review(&self, review: NewReview) -> StorageResult<Review>;
    async fn get_review(&self, id: i32) -> StorageResult<Option<Review>>;
    async fn reviews_by_event(&self, event_id: i32) -> StorageResult<Vec<Review>>;
    async fn update_review(&self, id: i32, changes: ReviewChanges)
        -> StorageResult<Option<Review>>;
    async fn delete_review(&self, id: i32) -> StorageResult<bool>;

    // Followers
    async fn follow_organizer(&self, follower_id: i32, organizer_id: i32)
        -> StorageResult<Follower>;
    async fn unfollow_organizer(&self, follower_id: i32, organizer_id: i32)
        -> StorageResult<bool>;
    async fn followers_of(&self, organizer_id: i32) -> StorageResult<Vec<User>>;
    async fn following_of(&self, follower_id: i32) -> StorageResult<Vec<User>>;
    async fn is_following(&self, follower_id: i32, organizer_id: i32) -> StorageResult<bool>;

    // Wishlists
    async fn add_to_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<Wishlist>;
    async fn remove_from_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<bool>;
    async fn wishlist_events(&self, user_id: i32) -> StorageResult<Vec<Event>>;
    async fn is_in_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<bool>;

    // Notifications
    async fn create_notification(&self, notification: NewNotification)
        -> StorageResult<Notification>;
    /// Oldest first.
    async fn notifications_for(&self, user_id: i32, unread_only: bool)
        -> StorageResult<Vec<Notification>>;
    async fn get_notification(&self, id: i32) -> StorageResult<Option<Notification>>;
    async fn mark_notification_read(&self, id: i32) -> StorageResult<Option<Notification>>;
    async fn mark_all_notifications_read(&self, user_id: i32) -> StorageResult<u64>;
    async fn delete_notification(&self, id: i32) -> StorageResult<bool>;

    // Promocodes
    async fn create_promocode(&self, promocode: NewPromocode) -> StorageResult<Promocode>;
    async fn promocode_by_code(&self, code: &str) -> StorageResult<Option<Promocode>>;
    async fn promocodes_by_creator(&self, creator_id: i32) -> StorageResult<Vec<Promocode>>;
    async fn promocodes_by_event(&self, event_id: i32) -> StorageResult<Vec<Promocode>>;
}
