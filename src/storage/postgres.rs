use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgExecutor, PgPool, PgPoolOptions};

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
    PurchaseStatus, Review, ReviewChanges, User, UserChanges, Wishlist,
};
use crate::utils::error::AppError;

/// Wraps `term` for a case-insensitive substring `ILIKE`, escaping the
/// pattern metacharacters so user input is matched literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Tells apart which natural key of `users` a unique violation hit.
fn user_conflict(err: sqlx::Error) -> AppError {
    let message = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            if db.constraint().is_some_and(|c| c.contains("email")) {
                EMAIL_TAKEN
            } else {
                USERNAME_TAKEN
            }
        }
        _ => return AppError::DatabaseError(err),
    };
    AppError::ValidationError(message.to_string())
}

async fn refresh_rating_in<'e, E>(executor: E, event_id: i32) -> Result<Option<Event>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Event>(
        "UPDATE events SET
            average_rating = (SELECT AVG(rating)::float8 FROM reviews WHERE event_id = $1),
            total_ratings = (SELECT COUNT(*)::int4 FROM reviews WHERE event_id = $1),
            updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(event_id)
    .fetch_optional(executor)
    .await
}

/// Fails with 400 when `quantity` more seats do not fit `event`. Callers
/// hold the event row lock.
async fn ensure_seats_in<'e, E>(executor: E, event: &Event, quantity: i32) -> StorageResult<()>
where
    E: PgExecutor<'e>,
{
    let held = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(quantity), 0)::int8 FROM purchases
         WHERE event_id = $1 AND status IN ('pending', 'completed')",
    )
    .bind(event.id)
    .fetch_one(executor)
    .await?;
    if let Some(left) = seats_remaining(event.capacity, held) {
        if i64::from(quantity) > left {
            return Err(AppError::ValidationError(NOT_ENOUGH_TICKETS.to_string()));
        }
    }
    Ok(())
}

async fn redeem_promocode_in<'e, E>(executor: E, id: i32) -> Result<Option<Promocode>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Promocode>(
        "UPDATE promocodes SET uses_count = uses_count + 1
         WHERE id = $1
           AND is_active
           AND (max_uses IS NULL OR max_uses <= 0 OR uses_count < max_uses)
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password, full_name, role, profile_image, bio, phone)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(&user.profile_image)
        .bind(&user.bio)
        .bind(&user.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(user_conflict)
    }

    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> StorageResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET
                email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                role = COALESCE($4, role),
                profile_image = COALESCE($5, profile_image),
                bio = COALESCE($6, bio),
                phone = COALESCE($7, phone),
                password = COALESCE($8, password)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.full_name)
        .bind(changes.role)
        .bind(changes.profile_image)
        .bind(changes.bio)
        .bind(changes.phone)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(user_conflict)
    }

    async fn update_last_login(&self, id: i32, at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn search_users(&self, query: &str) -> StorageResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT * FROM users
             WHERE username ILIKE $1 OR email ILIKE $1 OR full_name ILIKE $1
             ORDER BY username",
        )
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_users(&self) -> StorageResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: i32) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        let reviewed = sqlx::query_scalar::<_, i32>(
            "SELECT DISTINCT event_id FROM reviews WHERE user_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for statement in [
            "DELETE FROM purchases WHERE user_id = $1",
            "DELETE FROM reviews WHERE user_id = $1",
            "DELETE FROM followers WHERE follower_id = $1 OR organizer_id = $1",
            "DELETE FROM wishlists WHERE user_id = $1",
            "DELETE FROM notifications WHERE user_id = $1",
            "DELETE FROM promocodes WHERE creator_id = $1",
            "DELETE FROM sessions WHERE user_id = $1",
            "DELETE FROM users WHERE id = $1",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *tx).await?;
        }

        for event_id in reviewed {
            refresh_rating_in(&mut *tx, event_id).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn create_session(
        &self,
        token: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session_user(&self, token: &str, now: DateTime<Utc>) -> StorageResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT u.* FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = $1 AND s.expires_at > $2",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_events(&self, filter: &EventFilter) -> StorageResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            "SELECT * FROM events
             WHERE published
               AND ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1 OR location ILIKE $1)
               AND ($2::text IS NULL OR LOWER(genre) = LOWER($2))
               AND ($3::bool IS NULL OR is_featured = $3)
               AND ($4::date IS NULL OR date = $4)
             ORDER BY date, id",
        )
        .bind(filter.search_term().map(like_pattern))
        .bind(filter.genre_term())
        .bind(filter.featured)
        .bind(filter.date)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_event(&self, id: i32) -> StorageResult<Option<Event>> {
        Ok(sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn events_by_creator(&self, creator_id: i32) -> StorageResult<Vec<Event>> {
        Ok(
            sqlx::query_as::<_, Event>("SELECT * FROM events WHERE creator_id = $1 ORDER BY date, id")
                .bind(creator_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> StorageResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            "SELECT * FROM events
             WHERE published AND date >= $1
             ORDER BY date, id
             LIMIT $2",
        )
        .bind(from)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_event(&self, event: NewEvent) -> StorageResult<Event> {
        Ok(sqlx::query_as::<_, Event>(
            "INSERT INTO events (
                title, description, date, time, location, price, genre, image_url,
                capacity, is_featured, creator_id, published, latitude, longitude,
                end_date, end_time
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING *",
        )
        .bind(event.title)
        .bind(event.description)
        .bind(event.date)
        .bind(event.time)
        .bind(event.location)
        .bind(event.price)
        .bind(event.genre)
        .bind(event.image_url)
        .bind(event.capacity)
        .bind(event.is_featured)
        .bind(event.creator_id)
        .bind(event.published)
        .bind(event.latitude)
        .bind(event.longitude)
        .bind(event.end_date)
        .bind(event.end_time)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_event(&self, id: i32, changes: EventChanges) -> StorageResult<Option<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            "UPDATE events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                date = COALESCE($4, date),
                time = COALESCE($5, time),
                location = COALESCE($6, location),
                price = COALESCE($7, price),
                genre = COALESCE($8, genre),
                image_url = COALESCE($9, image_url),
                capacity = COALESCE($10, capacity),
                is_featured = COALESCE($11, is_featured),
                published = COALESCE($12, published),
                latitude = COALESCE($13, latitude),
                longitude = COALESCE($14, longitude),
                end_date = COALESCE($15, end_date),
                end_time = COALESCE($16, end_time),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.date)
        .bind(changes.time)
        .bind(changes.location)
        .bind(changes.price)
        .bind(changes.genre)
        .bind(changes.image_url)
        .bind(changes.capacity)
        .bind(changes.is_featured)
        .bind(changes.published)
        .bind(changes.latitude)
        .bind(changes.longitude)
        .bind(changes.end_date)
        .bind(changes.end_time)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_event(&self, id: i32) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;
        for statement in [
            "DELETE FROM reviews WHERE event_id = $1",
            "DELETE FROM wishlists WHERE event_id = $1",
            "DELETE FROM promocodes WHERE event_id = $1",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *tx).await?;
        }
        let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn create_purchase(
        &self,
        purchase: NewPurchase,
        now: DateTime<Utc>,
    ) -> StorageResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        // The row lock serializes purchases per event for the capacity check.
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
            .bind(purchase.event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(event_not_found)?;

        ensure_seats_in(&mut *tx, &event, purchase.quantity).await?;

        let promo = match purchase.promocode.as_deref() {
            Some(code) => {
                let found = sqlx::query_as::<_, Promocode>(
                    "SELECT * FROM promocodes WHERE code = $1 FOR UPDATE",
                )
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?;
                Some(
                    promocode::validate(found, Some(event.id), now)
                        .map_err(|_| AppError::ValidationError(INVALID_PROMOCODE.to_string()))?,
                )
            }
            None => None,
        };
        let price = PriceBreakdown::compute(event.price, purchase.quantity, promo.as_ref())
            .ok_or_else(order_too_large)?;

        if let Some(p) = &promo {
            redeem_promocode_in(&mut *tx, p.id)
                .await?
                .ok_or_else(|| AppError::ValidationError(PROMOCODE_EXHAUSTED.to_string()))?;
        }

        let created = sqlx::query_as::<_, Purchase>(
            "INSERT INTO purchases (
                event_id, user_id, quantity, total_amount, status, ticket_code,
                promocode_id, discount_amount, purchase_date
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(event.id)
        .bind(purchase.user_id)
        .bind(purchase.quantity)
        .bind(price.total)
        .bind(PurchaseStatus::Completed)
        .bind(generate_ticket_code())
        .bind(promo.as_ref().map(|p| p.id))
        .bind(promo.as_ref().map(|_| price.discount))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_purchase(&self, id: i32) -> StorageResult<Option<Purchase>> {
        Ok(sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn purchase_by_ticket_code(&self, code: &str) -> StorageResult<Option<Purchase>> {
        Ok(
            sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE ticket_code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn purchases_by_event(&self, event_id: i32) -> StorageResult<Vec<Purchase>> {
        Ok(sqlx::query_as::<_, Purchase>(
            "SELECT * FROM purchases WHERE event_id = $1 ORDER BY purchase_date, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn purchases_by_user(&self, user_id: i32) -> StorageResult<Vec<Purchase>> {
        Ok(sqlx::query_as::<_, Purchase>(
            "SELECT * FROM purchases WHERE user_id = $1 ORDER BY purchase_date, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_purchase_status(
        &self,
        id: i32,
        status: PurchaseStatus,
    ) -> StorageResult<Option<Purchase>> {
        let mut tx = self.pool.begin().await?;

        let Some(current) =
            sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        if status.holds_seats() && !current.status.holds_seats() {
            // Same lock order as create_purchase: the event row first.
            let event =
                sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
                    .bind(current.event_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some(event) = event {
                ensure_seats_in(&mut *tx, &event, current.quantity).await?;
            }
        }

        let updated = sqlx::query_as::<_, Purchase>(
            "UPDATE purchases SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn check_in_ticket(&self, code: &str, now: DateTime<Utc>) -> StorageResult<Purchase> {
        let checked = sqlx::query_as::<_, Purchase>(
            "UPDATE purchases SET is_checked_in = TRUE, check_in_date = $2
             WHERE ticket_code = $1 AND NOT is_checked_in AND status = 'completed'
             RETURNING *",
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(purchase) = checked {
            return Ok(purchase);
        }

        match self.purchase_by_ticket_code(code).await? {
            None => Err(ticket_not_found()),
            Some(p) if p.is_checked_in => Err(AppError::ValidationError(
                "Ticket already checked in".to_string(),
            )),
            Some(p) => Err(AppError::ValidationError(format!(
                "Ticket is {} and cannot be checked in",
                p.status
            ))),
        }
    }

    async fn create_review(&self, review: NewReview) -> StorageResult<Review> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(review.event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(event_not_found)?;

        let created = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (event_id, user_id, rating, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(review.event_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(review.comment)
        .fetch_one(&mut *tx)
        .await?;

        refresh_rating_in(&mut *tx, created.event_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_review(&self, id: i32) -> StorageResult<Option<Review>> {
        Ok(sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn reviews_by_event(&self, event_id: i32) -> StorageResult<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE event_id = $1 ORDER BY created_at, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_review(
        &self,
        id: i32,
        changes: ReviewChanges,
    ) -> StorageResult<Option<Review>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, Review>(
            "UPDATE reviews SET
                rating = COALESCE($2, rating),
                comment = COALESCE($3, comment),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(changes.rating)
        .bind(changes.comment)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(review) = &updated {
            refresh_rating_in(&mut *tx, review.event_id).await?;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_review(&self, id: i32) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;
        let event_id =
            sqlx::query_scalar::<_, i32>("DELETE FROM reviews WHERE id = $1 RETURNING event_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(event_id) = event_id else {
            return Ok(false);
        };
        refresh_rating_in(&mut *tx, event_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn follow_organizer(
        &self,
        follower_id: i32,
        organizer_id: i32,
    ) -> StorageResult<Follower> {
        sqlx::query_as::<_, Follower>(
            "INSERT INTO followers (follower_id, organizer_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(follower_id)
        .bind(organizer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, ALREADY_FOLLOWING))
    }

    async fn unfollow_organizer(&self, follower_id: i32, organizer_id: i32) -> StorageResult<bool> {
        let result =
            sqlx::query("DELETE FROM followers WHERE follower_id = $1 AND organizer_id = $2")
                .bind(follower_id)
                .bind(organizer_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn followers_of(&self, organizer_id: i32) -> StorageResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT u.* FROM followers f
             JOIN users u ON u.id = f.follower_id
             WHERE f.organizer_id = $1
             ORDER BY f.created_at, f.id",
        )
        .bind(organizer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn following_of(&self, follower_id: i32) -> StorageResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT u.* FROM followers f
             JOIN users u ON u.id = f.organizer_id
             WHERE f.follower_id = $1
             ORDER BY f.created_at, f.id",
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn is_following(&self, follower_id: i32, organizer_id: i32) -> StorageResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM followers WHERE follower_id = $1 AND organizer_id = $2)",
        )
        .bind(follower_id)
        .bind(organizer_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn add_to_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<Wishlist> {
        if self.get_event(event_id).await?.is_none() {
            return Err(event_not_found());
        }
        sqlx::query_as::<_, Wishlist>(
            "INSERT INTO wishlists (user_id, event_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, ALREADY_IN_WISHLIST))
    }

    async fn remove_from_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn wishlist_events(&self, user_id: i32) -> StorageResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            "SELECT e.* FROM wishlists w
             JOIN events e ON e.id = w.event_id
             WHERE w.user_id = $1
             ORDER BY w.created_at, w.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn is_in_wishlist(&self, user_id: i32, event_id: i32) -> StorageResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM wishlists WHERE user_id = $1 AND event_id = $2)",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StorageResult<Notification> {
        Ok(sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, type, message, related_id)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(notification.message)
        .bind(notification.related_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn notifications_for(
        &self,
        user_id: i32,
        unread_only: bool,
    ) -> StorageResult<Vec<Notification>> {
        Ok(sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications
             WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
             ORDER BY created_at, id",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_notification(&self, id: i32) -> StorageResult<Option<Notification>> {
        Ok(
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn mark_notification_read(&self, id: i32) -> StorageResult<Option<Notification>> {
        Ok(sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn mark_all_notifications_read(&self, user_id: i32) -> StorageResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: i32) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_promocode(&self, promocode: NewPromocode) -> StorageResult<Promocode> {
        sqlx::query_as::<_, Promocode>(
            "INSERT INTO promocodes (
                code, discount_type, discount_amount, max_uses, event_id, creator_id,
                start_date, end_date, is_active
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(promocode.code)
        .bind(promocode.discount_type)
        .bind(promocode.discount_amount)
        .bind(promocode.max_uses)
        .bind(promocode.event_id)
        .bind(promocode.creator_id)
        .bind(promocode.start_date)
        .bind(promocode.end_date)
        .bind(promocode.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, PROMOCODE_TAKEN))
    }

    async fn promocode_by_code(&self, code: &str) -> StorageResult<Option<Promocode>> {
        Ok(sqlx::query_as::<_, Promocode>("SELECT * FROM promocodes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn promocodes_by_creator(&self, creator_id: i32) -> StorageResult<Vec<Promocode>> {
        Ok(sqlx::query_as::<_, Promocode>(
            "SELECT * FROM promocodes WHERE creator_id = $1 ORDER BY created_at, id",
        )
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn promocodes_by_event(&self, event_id: i32) -> StorageResult<Vec<Promocode>> {
        Ok(sqlx::query_as::<_, Promocode>(
            "SELECT * FROM promocodes WHERE event_id = $1 ORDER BY created_at, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
