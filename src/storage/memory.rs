use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{
    event_not_found, order_too_large, ticket_not_found, Storage, StorageResult,
    ALREADY_FOLLOWING, ALREADY_IN_WISHLIST, EMAIL_TAKEN, INVALID_PROMOCODE, NOT_ENOUGH_TICKETS,
    PROMOCODE_EXHAUSTED, PROMOCODE_TAKEN, USERNAME_TAKEN,
};
use crate::models::promocode;
use crate::models::purchase::{generate_ticket_code, seats_remaining};
use crate::models::{
    Event, EventChanges, EventFilter, Follower, NewEvent, NewNotification, NewPromocode,
    NewPurchase, NewReview, NewUser, Notification, PriceBreakdown, Promocode, Purchase,
    PurchaseStatus, RatingSummary, Review, ReviewChanges, User, UserChanges, Wishlist,
};
use crate::utils::error::AppError;

struct SessionRecord {
    user_id: i32,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: Vec<User>,
    sessions: HashMap<String, SessionRecord>,
    events: Vec<Event>,
    purchases: Vec<Purchase>,
    reviews: Vec<Review>,
    followers: Vec<Follower>,
    wishlists: Vec<Wishlist>,
    notifications: Vec<Notification>,
    promocodes: Vec<Promocode>,
}

impl Tables {
    /// Ids are unique across all tables, which keeps them unambiguous in logs.
    fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: i32) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn event(&self, id: i32) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    fn promocode_by_code(&self, code: &str) -> Option<&Promocode> {
        self.promocodes.iter().find(|p| p.code == code)
    }

    /// Fails with 400 when `quantity` more seats do not fit the event.
    fn ensure_seats(&self, event: &Event, quantity: i32) -> StorageResult<()> {
        if let Some(left) = seats_remaining(event.capacity, self.seats_held(event.id)) {
            if i64::from(quantity) > left {
                return Err(AppError::ValidationError(NOT_ENOUGH_TICKETS.to_string()));
            }
        }
        Ok(())
    }

    /// Conditional increment of `uses_count`; `None` when the code is
    /// inactive or out of uses.
    fn redeem(&mut self, id: i32) -> Option<Promocode> {
        let promocode = self
            .promocodes
            .iter_mut()
            .find(|p| p.id == id && p.is_active && p.has_uses_left())?;
        promocode.uses_count += 1;
        Some(promocode.clone())
    }

    fn seats_held(&self, event_id: i32) -> i64 {
        self.purchases
            .iter()
            .filter(|p| p.event_id == event_id && p.status.holds_seats())
            .map(|p| i64::from(p.quantity))
            .sum()
    }

    fn refresh_rating(&mut self, event_id: i32) -> Option<Event> {
        let summary = RatingSummary::from_ratings(
            self.reviews
                .iter()
                .filter(|r| r.event_id == event_id)
                .map(|r| r.rating),
        );
        let event = self.events.iter_mut().find(|e| e.id == event_id)?;
        event.average_rating = summary.average;
        event.total_ratings = summary.count;
        event.updated_at = Utc::now();
        Some(event.clone())
    }

    fn users_by_ids(&self, ids: impl Iterator<Item = i32>) -> Vec<User> {
        ids.filter_map(|id| self.user(id).cloned()).collect()
    }
}

/// Process-local storage. Every call holds one lock over all tables, so
/// each operation is atomic.
#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::ValidationError(USERNAME_TAKEN.to_string()));
        }
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::ValidationError(EMAIL_TAKEN.to_string()));
        }
        let created = User {
            id: t.allocate_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            profile_image: user.profile_image,
            bio: user.bio,
            phone: user.phone,
            last_login: None,
            created_at: Utc::now(),
        };
        t.users.push(created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        Ok(self.tables.lock().await.user(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> StorageResult<Option<User>> {
        let mut t = self.tables.lock().await;
        if let Some(email) = &changes.email {
            if t.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::ValidationError(EMAIL_TAKEN.to_string()));
            }
        }
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|user| {
            changes.apply(user);
            user.clone()
        }))
    }

    async fn update_last_login(&self, id: i32, at: DateTime<Utc>) -> StorageResult<()> {
        let mut t = self.tables.lock().await;
        if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let t = self.tables.lock().await;
        let mut users = t.users.clone();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn search_users(&self, query: &str) -> StorageResult<Vec<User>> {
        let needle = query.to_lowercase();
        let t = self.tables.lock().await;
        let mut users: Vec<User> = t
            .users
            .iter()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.email.to_lowercase().contains(&needle)
                    || u
                        .full_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn count_users(&self) -> StorageResult<i64> {
        Ok(self.tables.lock().await.users.len() as i64)
    }

    async fn delete_user(&self, id: i32) -> StorageResult<bool> {
        let mut t = self.tables.lock().await;
        if t.user(id).is_none() {
            return Ok(false);
        }

        let reviewed: Vec<i32> = t
            .reviews
            .iter()
            .filter(|r| r.user_id == id)
            .map(|r| r.event_id)
            .collect();

        t.purchases.retain(|p| p.user_id != id);
        t.reviews.retain(|r| r.user_id != id);
        t.followers
            .retain(|f| f.follower_id != id && f.organizer_id != id);
        t.wishlists.retain(|w| w.user_id != id);
        t.notifications.retain(|n| n.user_id != id);
        t.promocodes.retain(|p| p.creator_id != id);
        t.sessions.retain(|_, s| s.user_id != id);
        t.users.retain(|u| u.id != id);

        for event_id in reviewed {
            t.refresh_rating(event_id);
        }
        Ok(true)
    }

    async fn create_session(
        &self,
        token: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.tables.lock().await.sessions.insert(
            token.to_string(),
            SessionRecord {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn session_user(&self, token: &str, now: DateTime<Utc>) -> StorageResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.sessions
            .get(token)
            .filter(|s| s.expires_at > now)
            .and_then(|s| t.user(s.user_id).cloned()))
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        self.tables.lock().await.sessions.remove(token);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut t = self.tables.lock().await;
        let before = t.sessions.len();
        t.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - t.sessions.len()) as u64)
    }

    async fn list_events(&self, filter: &EventFilter) -> StorageResult<Vec<Event>> {
        let t = self.tables.lock().await;
        let mut events: Vec<Event> = t.events.iter().filter(|e| filter.matches(e)).cloned().collect();
        events.sort_by_key(|e| (e.date, e.id));
        Ok(events)
    }

    async fn get_event(&self, id: i32) -> StorageResult<Option<Event>> {
        Ok(self.tables.lock().await.event(id).cloned())
    }

    async fn events_by_creator(&self, creator_id: i32) -> StorageResult<Vec<Event>> {
        let t = self.tables.lock().await;
        let mut events: Vec<Event> = t
            .events
            .iter()
            .filter(|e| e.creator_id == creator_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.date, e.id));
        Ok(events)
    }

    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> StorageResult<Vec<Event>> {
        let t = self.tables.lock().await;
        let mut events: Vec<Event> = t
            .events
            .iter()
            .filter(|e| e.published && e.date >= from)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.date, e.id));
        events.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(events)
    }

    async fn create_event(&self, event: NewEvent) -> StorageResult<Event> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let created = Event {
            id: t.allocate_id(),
            title: event.title,
            description: event.description,
            date: event.date,
            time: event.time,
            location: event.location,
            price: event.price,
            genre: event.genre,
            image_url: event.image_url,
            capacity: event.capacity,
            is_featured: event.is_featured,
            creator_id: event.creator_id,
            published: event.published,
            latitude: event.latitude,
            longitude: event.longitude,
            end_date: event.end_date,
            end_time: event.end_time,
            average_rating: None,
            total_ratings: 0,
            created_at: now,
            updated_at: now,
        };
        t.events.push(created.clone());
        Ok(created)
    }

    async fn update_event(&self, id: i32, changes: EventChanges) -> StorageResult<Option<Event>> {
        let mut t = self.tables.lock().await;
        Ok(t.events.iter_mut().find(|e| e.id == id).map(|event| {
            changes.apply(event);
            event.updated_at = Utc::now();
            event.clone()
        }))
    }

    async fn delete_event(&self, id: i32) -> StorageResult<bool> {
        let mut t = self.tables.lock().await;
        let before = t.events.len();
        t.events.retain(|e| e.id != id);
        if t.events.len() == before {
            return Ok(false);
        }
        t.reviews.retain(|r| r.event_id != id);
        t.wishlists.retain(|w| w.event_id != id);
        t.promocodes.retain(|p| p.event_id != Some(id));
        Ok(true)
    }

    async fn create_purchase(
        &self,
        purchase: NewPurchase,
        now: DateTime<Utc>,
    ) -> StorageResult<Purchase> {
        let mut t = self.tables.lock().await;
        let event = t.event(purchase.event_id).cloned().ok_or_else(event_not_found)?;

        t.ensure_seats(&event, purchase.quantity)?;

        let promo = match purchase.promocode.as_deref() {
            Some(code) => Some(
                promocode::validate(t.promocode_by_code(code).cloned(), Some(event.id), now)
                    .map_err(|_| AppError::ValidationError(INVALID_PROMOCODE.to_string()))?,
            ),
            None => None,
        };
        let price = PriceBreakdown::compute(event.price, purchase.quantity, promo.as_ref())
            .ok_or_else(order_too_large)?;

        if let Some(p) = &promo {
            t.redeem(p.id)
                .ok_or_else(|| AppError::ValidationError(PROMOCODE_EXHAUSTED.to_string()))?;
        }

        let created = Purchase {
            id: t.allocate_id(),
            event_id: event.id,
            user_id: purchase.user_id,
            quantity: purchase.quantity,
            total_amount: price.total,
            status: PurchaseStatus::Completed,
            ticket_code: generate_ticket_code(),
            promocode_id: promo.as_ref().map(|p| p.id),
            discount_amount: promo.as_ref().map(|_| price.discount),
            is_checked_in: false,
            check_in_date: None,
            purchase_date: now,
        };
        t.purchases.push(created.clone());
        Ok(created)
    }

    async fn get_purchase(&self, id: i32) -> StorageResult<Option<Purchase>> {
        let t = self.tables.lock().await;
        Ok(t.purchases.iter().find(|p| p.id == id).cloned())
    }

    async fn purchase_by_ticket_code(&self, code: &str) -> StorageResult<Option<Purchase>> {
        let t = self.tables.lock().await;
        Ok(t.purchases.iter().find(|p| p.ticket_code == code).cloned())
    }

    async fn purchases_by_event(&self, event_id: i32) -> StorageResult<Vec<Purchase>> {
        let t = self.tables.lock().await;
        Ok(t.purchases
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn purchases_by_user(&self, user_id: i32) -> StorageResult<Vec<Purchase>> {
        let t = self.tables.lock().await;
        Ok(t.purchases
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_purchase_status(
        &self,
        id: i32,
        status: PurchaseStatus,
    ) -> StorageResult<Option<Purchase>> {
        let mut t = self.tables.lock().await;
        let Some(current) = t.purchases.iter().find(|p| p.id == id).cloned() else {
            return Ok(None);
        };

        if status.holds_seats() && !current.status.holds_seats() {
            if let Some(event) = t.event(current.event_id).cloned() {
                t.ensure_seats(&event, current.quantity)?;
            }
        }

        Ok(t.purchases.iter_mut().find(|p| p.id == id).map(|p| {
            p.status = status;
            p.clone()
        }))
    }

    async fn check_in_ticket(&self, code: &str, now: DateTime<Utc>) -> StorageResult<Purchase> {
        let mut t = self.tables.lock().await;
        let purchase = t
            .purchases
            .iter_mut()
            .find(|p| p.ticket_code == code)
            .ok_or_else(ticket_not_found)?;

        if purchase.is_checked_in {
            return Err(AppError::ValidationError(
                "Ticket already checked in".to_string(),
            ));
        }
        if purchase.status != PurchaseStatus::Completed {
            return Err(AppError::ValidationError(format!(
                "Ticket is {} and cannot be checked in",
                purchase.status
            )));
        }
        purchase.is_checked_in = true;
        purchase.check_in_date = Some(now);
        Ok(purchase.clone())
    }

    async fn create_review(&self, review: NewReview) -> StorageResult<Review> {
        let mut t = self.tables.lock().await;
        if t.event(review.event_id).is_none() {
            return Err(event_not_found());
        }
        let now = Utc::now();
        let created = Review {
            id: t.allocate_id(),
            event_id: review.event_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            created_at: now,
            updated_at: now,
        };
        t.reviews.push(created.clone());
        t.refresh_rating(created.event_id);
        Ok(created)
    }

    async fn get_review(&self, id: i32) -> StorageResult<Option<Review>> {
        let t = self.tables.lock().await;
        Ok(t.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn reviews_by_event(&self, event_id: i32) -> StorageResult<Vec<Review>> {
        let t = self.tables.lock().await;
        Ok(t.reviews
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn update_review(
        &self,
        id: i32,
        changes: ReviewChanges,
    ) -> StorageResult<Option<Review>> {
        let mut t = self.tables.lock().await;
        let Some(review) = t.reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(rating) = changes.rating {
            review.rating = rating;
        }
        if let Some(comment) = changes.comment {
            review.comment = Some(comment);
        }
        review.updated_at = Utc::now();
        let updated = review.clone();
        t.refresh_rating(updated.event_id);
        Ok(Some(updated))
    }

    async fn delete_review(&self, id: i32) -> StorageResult<bool> {
        let mut t = self.tables.lock().await;
        let Some(pos) = t.reviews.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        let removed = t.reviews.remove(pos);
        t.refresh_rating(removed.event_id);
        Ok(true)
    }

    async fn follow_organizer(
        &self,
        follower_id: i32,
        organizer_id: i32,
    ) -> StorageResult<Follower> {
        let mut t = self.tables.lock().await;
        if t
            .followers
            .iter()
            .any(|f| f.follower_id == follower_id && f.organizer_id == organizer_id)
        {
            return Err(AppError::ValidationError(ALREADY_FOLLOWING.to_string()));
        }
        let edge = Follower {
            id: t.allocate_id(),
            follower_id,
            organizer_id,
            created_at: Utc::now(),
        };
        t.followers.push(edge.clone());
        Ok(edge)
    }

    async fn unfollow_organizer(&self, follower_id: i32, organizer_id: i32) -> StorageResult<bool> {
        let mut t = self.tables.lock().await;
        let before = t.followers.len();
        t.followers
            .retain(|f| !(f.follower_id == follower_id && f.organizer_id == organizer_id));
        Ok(t.followers.len() != before)
    }

    async fn followers_of(&self, organizer_id: i32) -> StorageResult<Vec<User>> {
        let t = self.tables.lock().await;
        let ids: Vec<i32> = t
            .followers
            .iter()
            .filter(|f| f.organizer_id == organizer_id)
            .map(|f| f.follower_id)
            .collect();
        Ok(t.users_by_ids(ids.into_iter()))
    }

    async fn following_of(&self, follower_id: i32) -> StorageResult<Vec<User>> {
        let t = self.tables.lock().await;
        let ids: Vec<i32> = t
            .followers
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .map(|f| f.organizer_id)
            .collect();
        Ok(t.users_by_ids(ids.into_iter()))
    }

    async fn is_following(&self, follower_id: i32, organizer_id: i32) -> StorageResult<bool> {
        let t = self.tables.lock().await;
        Ok(t
            .followers
            .iter()
            .any(|f| f.follower_id == follower_id && f.organizer_id == organizer_id))
    }

    async fn add_to_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<Wishlist> {
        let mut t = self.tables.lock().await;
        if t.event(event_id).is_none() {
            return Err(event_not_found());
        }
        if t
            .wishlists
            .iter()
            .any(|w| w.user_id == user_id && w.event_id == event_id)
        {
            return Err(AppError::ValidationError(ALREADY_IN_WISHLIST.to_string()));
        }
        let entry = Wishlist {
            id: t.allocate_id(),
            user_id,
            event_id,
            created_at: Utc::now(),
        };
        t.wishlists.push(entry.clone());
        Ok(entry)
    }

    async fn remove_from_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<bool> {
        let mut t = self.tables.lock().await;
        let before = t.wishlists.len();
        t.wishlists
            .retain(|w| !(w.user_id == user_id && w.event_id == event_id));
        Ok(t.wishlists.len() != before)
    }

    async fn wishlist_events(&self, user_id: i32) -> StorageResult<Vec<Event>> {
        let t = self.tables.lock().await;
        Ok(t.wishlists
            .iter()
            .filter(|w| w.user_id == user_id)
            .filter_map(|w| t.event(w.event_id).cloned())
            .collect())
    }

    async fn is_in_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<bool> {
        let t = self.tables.lock().await;
        Ok(t
            .wishlists
            .iter()
            .any(|w| w.user_id == user_id && w.event_id == event_id))
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StorageResult<Notification> {
        let mut t = self.tables.lock().await;
        let created = Notification {
            id: t.allocate_id(),
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message,
            related_id: notification.related_id,
            is_read: false,
            created_at: Utc::now(),
        };
        t.notifications.push(created.clone());
        Ok(created)
    }

    async fn notifications_for(
        &self,
        user_id: i32,
        unread_only: bool,
    ) -> StorageResult<Vec<Notification>> {
        let t = self.tables.lock().await;
        Ok(t.notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect())
    }

    async fn get_notification(&self, id: i32) -> StorageResult<Option<Notification>> {
        let t = self.tables.lock().await;
        Ok(t.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn mark_notification_read(&self, id: i32) -> StorageResult<Option<Notification>> {
        let mut t = self.tables.lock().await;
        Ok(t.notifications.iter_mut().find(|n| n.id == id).map(|n| {
            n.is_read = true;
            n.clone()
        }))
    }

    async fn mark_all_notifications_read(&self, user_id: i32) -> StorageResult<u64> {
        let mut t = self.tables.lock().await;
        let mut marked = 0;
        for n in t
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            marked += 1;
        }
        Ok(marked)
    }

    async fn delete_notification(&self, id: i32) -> StorageResult<bool> {
        let mut t = self.tables.lock().await;
        let before = t.notifications.len();
        t.notifications.retain(|n| n.id != id);
        Ok(t.notifications.len() != before)
    }

    async fn create_promocode(&self, promocode: NewPromocode) -> StorageResult<Promocode> {
        let mut t = self.tables.lock().await;
        if t.promocode_by_code(&promocode.code).is_some() {
            return Err(AppError::ValidationError(PROMOCODE_TAKEN.to_string()));
        }
        let created = Promocode {
            id: t.allocate_id(),
            code: promocode.code,
            discount_type: promocode.discount_type,
            discount_amount: promocode.discount_amount,
            max_uses: promocode.max_uses,
            uses_count: 0,
            event_id: promocode.event_id,
            creator_id: promocode.creator_id,
            start_date: promocode.start_date,
            end_date: promocode.end_date,
            is_active: promocode.is_active,
            created_at: Utc::now(),
        };
        t.promocodes.push(created.clone());
        Ok(created)
    }

    async fn promocode_by_code(&self, code: &str) -> StorageResult<Option<Promocode>> {
        Ok(self.tables.lock().await.promocode_by_code(code).cloned())
    }

    async fn promocodes_by_creator(&self, creator_id: i32) -> StorageResult<Vec<Promocode>> {
        let t = self.tables.lock().await;
        Ok(t.promocodes
            .iter()
            .filter(|p| p.creator_id == creator_id)
            .cloned()
            .collect())
    }

    async fn promocodes_by_event(&self, event_id: i32) -> StorageResult<Vec<Promocode>> {
        let t = self.tables.lock().await;
        Ok(t.promocodes
            .iter()
            .filter(|p| p.event_id == Some(event_id))
            .cloned()
            .collect())
    }
}
