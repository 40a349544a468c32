use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    auth, events, followers, health_check, notifications, promocodes, purchases, reviews, users,
    wishlist,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let security = create_security_headers_layer(state.config.production);
    let cors = create_cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(security)
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Session
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::current_user))
        .route("/user/:id", patch(users::update_profile))
        .route("/user/:id/password", patch(users::change_password))
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/featured", get(events::featured_events))
        .route("/events/upcoming", get(events::upcoming_events))
        .route(
            "/events/:id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/purchases", get(events::event_purchases))
        .route(
            "/events/:id/reviews",
            get(reviews::event_reviews).post(reviews::create_review),
        )
        .route("/events/:id/promocodes", get(events::event_promocodes))
        .route("/my-events", get(events::my_events))
        // Purchases
        .route("/purchases", post(purchases::create_purchase))
        .route("/purchases/check-in", post(purchases::check_in))
        .route("/purchases/:id", get(purchases::get_purchase))
        .route("/purchases/:id/ticket", get(purchases::get_ticket))
        .route("/purchases/:id/status", patch(purchases::update_status))
        .route("/my-purchases", get(purchases::my_purchases))
        // Reviews
        .route(
            "/reviews/:id",
            patch(reviews::update_review).delete(reviews::delete_review),
        )
        // Followers
        .route(
            "/organizers/:id/follow",
            get(followers::follow_status)
                .post(followers::follow)
                .delete(followers::unfollow),
        )
        .route("/organizers/:id/followers", get(followers::followers))
        .route("/my-following", get(followers::my_following))
        // Wishlist
        .route("/wishlist", get(wishlist::list).post(wishlist::add))
        .route(
            "/wishlist/:event_id",
            get(wishlist::contains).delete(wishlist::remove),
        )
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", patch(notifications::mark_read))
        .route("/notifications/:id", delete(notifications::delete))
        // Promocodes
        .route(
            "/promocodes",
            get(promocodes::my_promocodes).post(promocodes::create_promocode),
        )
        .route("/promocodes/validate", post(promocodes::validate_promocode))
        // Admin
        .route(
            "/admin/users",
            get(users::admin_list_users).post(users::admin_create_user),
        )
        .route(
            "/admin/users/:id",
            patch(users::admin_update_user).delete(users::admin_delete_user),
        )
}
