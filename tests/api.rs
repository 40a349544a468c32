use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use ticketing_server::bootstrap::ensure_admin;
use ticketing_server::config::{AdminBootstrap, Config, StorageBackend};
use ticketing_server::models::NewEvent;
use ticketing_server::routes::create_routes;
use ticketing_server::state::AppState;
use ticketing_server::storage::{MemoryStorage, Storage};

struct TestApp {
    router: Router,
    storage: Arc<MemoryStorage>,
}

struct Reply {
    status: StatusCode,
    set_cookie: Option<String>,
    body: Value,
}

impl TestApp {
    async fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let admin = AdminBootstrap {
            username: "admin".into(),
            email: "admin@example.com".into(),
            password: "admin-pass".into(),
        };
        ensure_admin(&*storage, Some(&admin))
            .await
            .expect("bootstrap admin");

        let config = Config {
            storage_backend: StorageBackend::Memory,
            ..Config::default()
        };
        let router = create_routes(AppState::new(storage.clone(), config));
        Self { router, storage }
    }

    async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        Reply {
            status,
            set_cookie,
            body,
        }
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Reply {
        self.send(Method::GET, uri, cookie, None).await
    }

    async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> Reply {
        self.send(Method::POST, uri, cookie, Some(body)).await
    }

    async fn patch(&self, uri: &str, cookie: Option<&str>, body: Value) -> Reply {
        self.send(Method::PATCH, uri, cookie, Some(body)).await
    }

    async fn delete(&self, uri: &str, cookie: Option<&str>) -> Reply {
        self.send(Method::DELETE, uri, cookie, None).await
    }

    /// Registers an account and returns `(session cookie, user id)`.
    async fn register(&self, username: &str, role: &str) -> (String, i64) {
        let reply = self
            .post(
                "/api/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "secret-pass",
                    "role": role,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        let cookie = reply.set_cookie.expect("session cookie");
        (cookie, reply.body["id"].as_i64().expect("user id"))
    }

    async fn login(&self, username: &str, password: &str) -> Reply {
        self.post(
            "/api/login",
            None,
            json!({ "username": username, "password": password }),
        )
        .await
    }

    async fn admin_cookie(&self) -> String {
        let reply = self.login("admin", "admin-pass").await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.set_cookie.expect("admin cookie")
    }

    async fn create_event(&self, cookie: &str, overrides: Value) -> Value {
        let mut body = json!({
            "title": "Jazz Night",
            "description": "Live jazz in the old town",
            "date": "2031-06-01",
            "time": "8:00 PM",
            "location": "Blue Note, New Orleans",
            "price": "20.00",
            "genre": "Concert",
            "imageUrl": "https://example.com/jazz.jpg",
        });
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        let reply = self.post("/api/events", Some(cookie), body).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body
    }
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().expect("decimal string").parse().expect("decimal")
}

#[tokio::test]
async fn health_check_carries_security_headers() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn register_login_logout_cycle() {
    let app = TestApp::new().await;
    let (cookie, id) = app.register("jane", "user").await;

    let me = app.get("/api/user", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], id);
    assert_eq!(me.body["role"], "user");
    assert!(me.body.get("password").is_none());
    assert!(me.body.get("passwordHash").is_none());

    let bad = app.login("jane", "wrong-pass").await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.body["error"], "Incorrect username or password");

    let good = app.login("jane", "secret-pass").await;
    assert_eq!(good.status, StatusCode::OK);
    assert!(good.body["lastLogin"].is_string());
    let session = good.set_cookie.unwrap();

    let out = app
        .send(Method::POST, "/api/logout", Some(&session), None)
        .await;
    assert_eq!(out.status, StatusCode::OK);
    assert_eq!(out.set_cookie.as_deref(), Some("sid="));

    let after = app.get("/api/user", Some(&session)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.body["error"], "Authentication required");
}

#[tokio::test]
async fn registration_rules() {
    let app = TestApp::new().await;
    app.register("jane", "user").await;

    let duplicate = app
        .post(
            "/api/register",
            None,
            json!({ "username": "jane", "email": "other@example.com", "password": "secret-pass" }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["error"], "Username already exists");

    let admin = app
        .post(
            "/api/register",
            None,
            json!({ "username": "mallory", "email": "m@example.com", "password": "secret-pass", "role": "admin" }),
        )
        .await;
    assert_eq!(admin.status, StatusCode::FORBIDDEN);

    let invalid = app
        .post(
            "/api/register",
            None,
            json!({ "username": "x", "email": "nope", "password": "1" }),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["code"], "INVALID_FIELDS");
    assert_eq!(invalid.body["details"].as_array().unwrap().len(), 3);

    let malformed = app
        .send(Method::POST, "/api/register", None, Some(json!({ "username": 5 })))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn event_creation_is_role_gated() {
    let app = TestApp::new().await;
    let (user, _) = app.register("jane", "user").await;
    let (organizer, organizer_id) = app.register("olga", "organizer").await;

    let anonymous = app.post("/api/events", None, json!({})).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forbidden = app.post("/api/events", Some(&user), json!({})).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(
        forbidden.body["error"],
        "You don't have permission to access this resource"
    );

    let event = app.create_event(&organizer, json!({})).await;
    assert_eq!(event["creatorId"], organizer_id);
    assert_eq!(event["published"], true);
    assert_eq!(event["totalRatings"], 0);

    let mine = app.get("/api/my-events", Some(&organizer)).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn event_ownership_is_enforced() {
    let app = TestApp::new().await;
    let (owner, _) = app.register("olga", "organizer").await;
    let (rival, _) = app.register("rita", "organizer").await;
    let admin = app.admin_cookie().await;
    let event = app.create_event(&owner, json!({})).await;
    let uri = format!("/api/events/{}", event["id"]);

    let denied = app.patch(&uri, Some(&rival), json!({ "title": "Mine now" })).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let renamed = app.patch(&uri, Some(&owner), json!({ "title": "Late Jazz" })).await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["title"], "Late Jazz");
    assert_eq!(renamed.body["location"], "Blue Note, New Orleans");

    let by_admin = app.patch(&uri, Some(&admin), json!({ "isFeatured": true })).await;
    assert_eq!(by_admin.status, StatusCode::OK);
    assert_eq!(by_admin.body["isFeatured"], true);

    assert_eq!(app.delete(&uri, Some(&rival)).await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.delete(&uri, Some(&owner)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_listing_filters() {
    let app = TestApp::new().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    app.create_event(&organizer, json!({ "isFeatured": true })).await;
    app.create_event(
        &organizer,
        json!({ "title": "Stand-up Hour", "genre": "Comedy", "date": "2031-07-01" }),
    )
    .await;
    app.create_event(&organizer, json!({ "title": "Secret Draft", "published": false }))
        .await;

    let all = app.get("/api/events", None).await;
    assert_eq!(all.body.as_array().unwrap().len(), 2);

    let comedy = app.get("/api/events?genre=comedy", None).await;
    assert_eq!(comedy.body[0]["title"], "Stand-up Hour");
    assert_eq!(comedy.body.as_array().unwrap().len(), 1);

    let every_genre = app.get("/api/events?genre=all", None).await;
    assert_eq!(every_genre.body.as_array().unwrap().len(), 2);

    // search wins over genre
    let searched = app.get("/api/events?search=JAZZ&genre=Comedy", None).await;
    assert_eq!(searched.body.as_array().unwrap().len(), 1);
    assert_eq!(searched.body[0]["title"], "Jazz Night");

    let featured = app.get("/api/events/featured", None).await;
    assert_eq!(featured.body.as_array().unwrap().len(), 1);

    let dated = app.get("/api/events?date=2031-07-01", None).await;
    assert_eq!(dated.body[0]["title"], "Stand-up Hour");

    let upcoming = app.get("/api/events/upcoming?limit=1", None).await;
    assert_eq!(upcoming.body.as_array().unwrap().len(), 1);
    assert_eq!(upcoming.body[0]["title"], "Jazz Night");

    assert_eq!(app.get("/api/events/abc", None).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/api/events/99999", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn purchase_with_promocode_and_capacity() {
    let app = TestApp::new().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    let (buyer, buyer_id) = app.register("bob", "user").await;
    let event = app.create_event(&organizer, json!({ "capacity": 3 })).await;
    let event_id = event["id"].as_i64().unwrap();

    let promo = app
        .post(
            "/api/promocodes",
            Some(&organizer),
            json!({
                "code": "JAZZ10",
                "discountType": "percentage",
                "discountAmount": 10,
                "maxUses": 1,
                "eventId": event_id,
            }),
        )
        .await;
    assert_eq!(promo.status, StatusCode::CREATED, "{}", promo.body);

    let quote = app
        .post(
            "/api/promocodes/validate",
            Some(&buyer),
            json!({ "code": "JAZZ10", "eventId": event_id, "quantity": 2 }),
        )
        .await;
    assert_eq!(quote.status, StatusCode::OK);
    assert_eq!(decimal(&quote.body["total"]), Decimal::new(36, 0));

    let bought = app
        .post(
            "/api/purchases",
            Some(&buyer),
            json!({ "eventId": event_id, "quantity": 2, "promocode": "JAZZ10", "totalAmount": "0.01" }),
        )
        .await;
    assert_eq!(bought.status, StatusCode::CREATED, "{}", bought.body);
    let purchase = &bought.body["purchase"];
    assert_eq!(purchase["userId"], buyer_id);
    assert_eq!(purchase["status"], "completed");
    assert_eq!(decimal(&purchase["totalAmount"]), Decimal::new(36, 0));
    assert_eq!(decimal(&purchase["discountAmount"]), Decimal::new(4, 0));

    // the single use is spent
    let reused = app
        .post(
            "/api/purchases",
            Some(&buyer),
            json!({ "eventId": event_id, "quantity": 1, "promocode": "JAZZ10" }),
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
    let invalid = app
        .post(
            "/api/promocodes/validate",
            Some(&buyer),
            json!({ "code": "JAZZ10" }),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::NOT_FOUND);
    assert_eq!(invalid.body["error"], "Invalid or expired promocode");

    let oversold = app
        .post(
            "/api/purchases",
            Some(&buyer),
            json!({ "eventId": event_id, "quantity": 2 }),
        )
        .await;
    assert_eq!(oversold.status, StatusCode::BAD_REQUEST);
    assert_eq!(oversold.body["error"], "Not enough tickets available");

    let last_seat = app
        .post(
            "/api/purchases",
            Some(&buyer),
            json!({ "eventId": event_id, "quantity": 1 }),
        )
        .await;
    assert_eq!(last_seat.status, StatusCode::CREATED);

    let mine = app.get("/api/my-purchases", Some(&buyer)).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 2);

    let notes = app.get("/api/notifications", Some(&buyer)).await;
    assert_eq!(notes.body[0]["type"], "purchase");
    assert_eq!(
        notes.body[0]["message"],
        "You have successfully purchased 2 ticket(s) for \"Jazz Night\"."
    );
}

#[tokio::test]
async fn purchase_visibility_and_check_in() {
    let app = TestApp::new().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    let (rival, _) = app.register("rita", "organizer").await;
    let (buyer, _) = app.register("bob", "user").await;
    let (stranger, _) = app.register("sam", "user").await;
    let event = app.create_event(&organizer, json!({})).await;

    let bought = app
        .post(
            "/api/purchases",
            Some(&buyer),
            json!({ "eventId": event["id"], "quantity": 1 }),
        )
        .await;
    let purchase_id = bought.body["purchase"]["id"].as_i64().unwrap();
    let code = bought.body["purchase"]["ticketCode"].as_str().unwrap().to_string();

    let uri = format!("/api/purchases/{purchase_id}");
    assert_eq!(app.get(&uri, Some(&buyer)).await.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&organizer)).await.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&stranger)).await.status, StatusCode::FORBIDDEN);

    let ticket = app.get(&format!("{uri}/ticket"), Some(&buyer)).await;
    assert_eq!(ticket.body["ticketCode"], code.as_str());
    assert!(ticket.body["qrCodeUrl"].as_str().unwrap().ends_with(&code));
    assert_eq!(ticket.body["isCheckedIn"], false);

    let sales = app
        .get(&format!("/api/events/{}/purchases", event["id"]), Some(&rival))
        .await;
    assert_eq!(sales.status, StatusCode::FORBIDDEN);

    let check_in = json!({ "ticketCode": code });
    let by_buyer = app.post("/api/purchases/check-in", Some(&buyer), check_in.clone()).await;
    assert_eq!(by_buyer.status, StatusCode::FORBIDDEN);
    let by_rival = app.post("/api/purchases/check-in", Some(&rival), check_in.clone()).await;
    assert_eq!(by_rival.status, StatusCode::FORBIDDEN);

    let first = app
        .post("/api/purchases/check-in", Some(&organizer), check_in.clone())
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["isCheckedIn"], true);

    let second = app.post("/api/purchases/check-in", Some(&organizer), check_in).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["error"], "Ticket already checked in");

    let unknown = app
        .post(
            "/api/purchases/check-in",
            Some(&organizer),
            json!({ "ticketCode": "does-not-exist" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refunds_release_seats() {
    let app = TestApp::new().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    let (buyer, _) = app.register("bob", "user").await;
    let event = app.create_event(&organizer, json!({ "capacity": 1 })).await;
    let order = json!({ "eventId": event["id"], "quantity": 1 });

    let bought = app.post("/api/purchases", Some(&buyer), order.clone()).await;
    let purchase_id = bought.body["purchase"]["id"].as_i64().unwrap();
    let sold_out = app.post("/api/purchases", Some(&buyer), order.clone()).await;
    assert_eq!(sold_out.status, StatusCode::BAD_REQUEST);

    let status_uri = format!("/api/purchases/{purchase_id}/status");
    let denied = app
        .patch(&status_uri, Some(&buyer), json!({ "status": "refunded" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let refunded = app
        .patch(&status_uri, Some(&organizer), json!({ "status": "refunded" }))
        .await;
    assert_eq!(refunded.body["status"], "refunded");

    let again = app.post("/api/purchases", Some(&buyer), order).await;
    assert_eq!(again.status, StatusCode::CREATED);

    // the released seat was resold, so the refund cannot be undone
    let restored = app
        .patch(&status_uri, Some(&organizer), json!({ "status": "completed" }))
        .await;
    assert_eq!(restored.status, StatusCode::BAD_REQUEST);
    assert_eq!(restored.body["error"], "Not enough tickets available");
    let pending = app
        .patch(&status_uri, Some(&organizer), json!({ "status": "pending" }))
        .await;
    assert_eq!(pending.status, StatusCode::BAD_REQUEST);
    let still_refunded = app
        .get(&format!("/api/purchases/{purchase_id}"), Some(&buyer))
        .await;
    assert_eq!(still_refunded.body["status"], "refunded");
}

#[tokio::test]
async fn promocode_window_and_scope_apply_at_purchase() {
    let app = TestApp::new().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    let (buyer, _) = app.register("bob", "user").await;
    let jazz = app.create_event(&organizer, json!({})).await;
    let blues = app.create_event(&organizer, json!({ "title": "Blues Night" })).await;

    let now = Utc::now();
    let expired = app
        .post(
            "/api/promocodes",
            Some(&organizer),
            json!({
                "code": "SUMMER",
                "discountType": "fixed",
                "discountAmount": 5,
                "startDate": (now - Duration::days(30)).to_rfc3339(),
                "endDate": (now - Duration::days(1)).to_rfc3339(),
            }),
        )
        .await;
    assert_eq!(expired.status, StatusCode::CREATED, "{}", expired.body);
    let upcoming = app
        .post(
            "/api/promocodes",
            Some(&organizer),
            json!({
                "code": "LATER",
                "discountType": "fixed",
                "discountAmount": 5,
                "startDate": (now + Duration::days(1)).to_rfc3339(),
            }),
        )
        .await;
    assert_eq!(upcoming.status, StatusCode::CREATED, "{}", upcoming.body);
    let scoped = app
        .post(
            "/api/promocodes",
            Some(&organizer),
            json!({
                "code": "JAZZONLY",
                "discountType": "percentage",
                "discountAmount": 50,
                "eventId": jazz["id"],
            }),
        )
        .await;
    assert_eq!(scoped.status, StatusCode::CREATED, "{}", scoped.body);

    for (code, event) in [("SUMMER", &jazz), ("LATER", &jazz), ("JAZZONLY", &blues)] {
        let rejected = app
            .post(
                "/api/purchases",
                Some(&buyer),
                json!({ "eventId": event["id"], "quantity": 1, "promocode": code }),
            )
            .await;
        assert_eq!(rejected.status, StatusCode::BAD_REQUEST, "{code}");
        assert_eq!(rejected.body["error"], "Invalid or expired promocode", "{code}");
    }
    let unused = app.storage.promocode_by_code("JAZZONLY").await.unwrap().unwrap();
    assert_eq!(unused.uses_count, 0);
    assert!(app.get("/api/my-purchases", Some(&buyer)).await.body.as_array().unwrap().is_empty());

    let accepted = app
        .post(
            "/api/purchases",
            Some(&buyer),
            json!({ "eventId": jazz["id"], "quantity": 1, "promocode": "JAZZONLY" }),
        )
        .await;
    assert_eq!(accepted.status, StatusCode::CREATED, "{}", accepted.body);
    assert_eq!(decimal(&accepted.body["purchase"]["totalAmount"]), Decimal::new(10, 0));
}

#[tokio::test]
async fn oversized_amounts_are_rejected() {
    let app = TestApp::new().await;
    let (organizer, organizer_id) = app.register("olga", "organizer").await;
    let (buyer, _) = app.register("bob", "user").await;

    let pricey = app
        .post(
            "/api/events",
            Some(&organizer),
            json!({
                "title": "Gala", "description": "d", "date": "2031-06-01", "time": "7pm",
                "location": "l", "imageUrl": "i", "price": "1000000000",
            }),
        )
        .await;
    assert_eq!(pricey.status, StatusCode::BAD_REQUEST);
    assert_eq!(pricey.body["code"], "INVALID_FIELDS");

    // rows written before the price ceiling existed
    let event = app
        .storage
        .create_event(NewEvent {
            title: "Gala".into(),
            description: "Black tie".into(),
            date: NaiveDate::from_ymd_opt(2031, 6, 1).unwrap(),
            time: "7:00 PM".into(),
            location: "Opera House".into(),
            price: Decimal::from_scientific("1e27").unwrap(),
            genre: None,
            image_url: "https://example.com/gala.jpg".into(),
            capacity: None,
            is_featured: false,
            creator_id: organizer_id as i32,
            published: true,
            latitude: None,
            longitude: None,
            end_date: None,
            end_time: None,
        })
        .await
        .unwrap();

    let order = app
        .post(
            "/api/purchases",
            Some(&buyer),
            json!({ "eventId": event.id, "quantity": 100 }),
        )
        .await;
    assert_eq!(order.status, StatusCode::BAD_REQUEST);
    assert_eq!(order.body["error"], "Order total is too large");
    assert!(app.get("/api/my-purchases", Some(&buyer)).await.body.as_array().unwrap().is_empty());

    app.post(
        "/api/promocodes",
        Some(&organizer),
        json!({ "code": "GALA", "discountType": "fixed", "discountAmount": 5 }),
    )
    .await;
    let quote = app
        .post(
            "/api/promocodes/validate",
            Some(&buyer),
            json!({ "code": "GALA", "eventId": event.id, "quantity": 100 }),
        )
        .await;
    assert_eq!(quote.status, StatusCode::BAD_REQUEST);
    assert_eq!(quote.body["error"], "Order total is too large");

    for quantity in [0, 1000] {
        let quote = app
            .post(
                "/api/promocodes/validate",
                Some(&buyer),
                json!({ "code": "GALA", "eventId": event.id, "quantity": quantity }),
            )
            .await;
        assert_eq!(quote.status, StatusCode::BAD_REQUEST, "{quantity}");
        assert_eq!(quote.body["code"], "INVALID_FIELDS");
    }
}

#[tokio::test]
async fn notifications_read_all_and_delete() {
    let app = TestApp::new().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    let (buyer, _) = app.register("bob", "user").await;
    let (stranger, _) = app.register("sam", "user").await;
    let event = app.create_event(&organizer, json!({})).await;

    for _ in 0..2 {
        let bought = app
            .post(
                "/api/purchases",
                Some(&buyer),
                json!({ "eventId": event["id"], "quantity": 1 }),
            )
            .await;
        assert_eq!(bought.status, StatusCode::CREATED);
    }

    let all_read = app
        .send(Method::POST, "/api/notifications/read-all", Some(&buyer), None)
        .await;
    assert_eq!(all_read.status, StatusCode::OK);
    assert_eq!(all_read.body["message"], "Marked 2 notification(s) as read");
    let unread = app.get("/api/notifications?unreadOnly=true", Some(&buyer)).await;
    assert!(unread.body.as_array().unwrap().is_empty());
    let none_left = app
        .send(Method::POST, "/api/notifications/read-all", Some(&buyer), None)
        .await;
    assert_eq!(none_left.body["message"], "Marked 0 notification(s) as read");

    let notes = app.get("/api/notifications", Some(&buyer)).await;
    let note_id = notes.body[0]["id"].as_i64().unwrap();
    let note_uri = format!("/api/notifications/{note_id}");

    let foreign = app.delete(&note_uri, Some(&stranger)).await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);
    assert_eq!(app.delete(&note_uri, None).await.status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.delete(&note_uri, Some(&buyer)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&note_uri, Some(&buyer)).await.status, StatusCode::NOT_FOUND);
    let remaining = app.get("/api/notifications", Some(&buyer)).await;
    assert_eq!(remaining.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn ratings_follow_the_review_set() {
    let app = TestApp::new().await;
    let (organizer, organizer_id) = app.register("olga", "organizer").await;
    let (alice, _) = app.register("alice", "user").await;
    let (bob, bob_id) = app.register("bob", "user").await;
    let event = app.create_event(&organizer, json!({})).await;
    let reviews_uri = format!("/api/events/{}/reviews", event["id"]);
    let event_uri = format!("/api/events/{}", event["id"]);

    let bad = app.post(&reviews_uri, Some(&alice), json!({ "rating": 6 })).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let first = app
        .post(&reviews_uri, Some(&alice), json!({ "rating": 5, "comment": "Great" }))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    let second = app.post(&reviews_uri, Some(&bob), json!({ "rating": 3 })).await;
    let second_uri = format!("/api/reviews/{}", second.body["id"]);

    let rated = app.get(&event_uri, None).await;
    assert_eq!(rated.body["averageRating"], 4.0);
    assert_eq!(rated.body["totalRatings"], 2);

    let not_author = app.patch(&second_uri, Some(&alice), json!({ "rating": 1 })).await;
    assert_eq!(not_author.status, StatusCode::FORBIDDEN);

    app.patch(&second_uri, Some(&bob), json!({ "rating": 5 })).await;
    let edited = app.get(&event_uri, None).await;
    assert_eq!(edited.body["averageRating"], 5.0);
    assert_eq!(edited.body["totalRatings"], 2);

    let first_uri = format!("/api/reviews/{}", first.body["id"]);
    assert_eq!(app.delete(&first_uri, Some(&alice)).await.status, StatusCode::NO_CONTENT);
    let after_delete = app.get(&event_uri, None).await;
    assert_eq!(after_delete.body["totalRatings"], 1);

    // removing the last reviewer clears the aggregate
    let admin = app.admin_cookie().await;
    let removed = app
        .delete(&format!("/api/admin/users/{bob_id}"), Some(&admin))
        .await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let cleared = app.get(&event_uri, None).await;
    assert_eq!(cleared.body["totalRatings"], 0);
    assert!(cleared.body["averageRating"].is_null());

    let notes = app
        .storage
        .notifications_for(organizer_id as i32, false)
        .await
        .unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(
        notes[0].message,
        "Someone left a 5-star review for your event \"Jazz Night\"."
    );
}

#[tokio::test]
async fn following_organizers() {
    let app = TestApp::new().await;
    let (organizer, organizer_id) = app.register("olga", "organizer").await;
    let (fan, _) = app.register("fan", "user").await;
    let (_, plain_id) = app.register("plain", "user").await;
    let follow_uri = format!("/api/organizers/{organizer_id}/follow");

    let followed = app.send(Method::POST, &follow_uri, Some(&fan), None).await;
    assert_eq!(followed.status, StatusCode::CREATED);
    let twice = app.send(Method::POST, &follow_uri, Some(&fan), None).await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);

    let not_organizer = app
        .send(Method::POST, &format!("/api/organizers/{plain_id}/follow"), Some(&fan), None)
        .await;
    assert_eq!(not_organizer.status, StatusCode::BAD_REQUEST);
    let self_follow = app.send(Method::POST, &follow_uri, Some(&organizer), None).await;
    assert_eq!(self_follow.status, StatusCode::BAD_REQUEST);

    let status = app.get(&follow_uri, Some(&fan)).await;
    assert_eq!(status.body["following"], true);

    let followers = app
        .get(&format!("/api/organizers/{organizer_id}/followers"), None)
        .await;
    assert_eq!(followers.body[0]["username"], "fan");

    let notes = app.get("/api/notifications?unreadOnly=true", Some(&organizer)).await;
    assert_eq!(notes.body[0]["message"], "fan is now following you.");
    let note_id = notes.body[0]["id"].as_i64().unwrap();

    let foreign = app
        .send(Method::PATCH, &format!("/api/notifications/{note_id}/read"), Some(&fan), None)
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);
    let read = app
        .send(Method::PATCH, &format!("/api/notifications/{note_id}/read"), Some(&organizer), None)
        .await;
    assert_eq!(read.body["isRead"], true);
    let unread = app.get("/api/notifications?unreadOnly=true", Some(&organizer)).await;
    assert!(unread.body.as_array().unwrap().is_empty());

    assert_eq!(app.delete(&follow_uri, Some(&fan)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&follow_uri, Some(&fan)).await.status, StatusCode::NOT_FOUND);
    let following = app.get("/api/my-following", Some(&fan)).await;
    assert!(following.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn wishlist_round() {
    let app = TestApp::new().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    let (fan, _) = app.register("fan", "user").await;
    let event = app.create_event(&organizer, json!({})).await;
    let entry_uri = format!("/api/wishlist/{}", event["id"]);

    let added = app
        .post("/api/wishlist", Some(&fan), json!({ "eventId": event["id"] }))
        .await;
    assert_eq!(added.status, StatusCode::CREATED);
    let duplicate = app
        .post("/api/wishlist", Some(&fan), json!({ "eventId": event["id"] }))
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    let missing = app
        .post("/api/wishlist", Some(&fan), json!({ "eventId": 424242 }))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    assert_eq!(app.get(&entry_uri, Some(&fan)).await.body["inWishlist"], true);
    let listed = app.get("/api/wishlist", Some(&fan)).await;
    assert_eq!(listed.body[0]["title"], "Jazz Night");

    assert_eq!(app.delete(&entry_uri, Some(&fan)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&entry_uri, Some(&fan)).await.body["inWishlist"], false);
    assert_eq!(app.delete(&entry_uri, Some(&fan)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_user_management() {
    let app = TestApp::new().await;
    let admin = app.admin_cookie().await;
    let (organizer, _) = app.register("olga", "organizer").await;
    let admin_id = app.get("/api/user", Some(&admin)).await.body["id"]
        .as_i64()
        .unwrap();

    let denied = app.get("/api/admin/users", Some(&organizer)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let created = app
        .post(
            "/api/admin/users",
            Some(&admin),
            json!({ "username": "staff", "email": "staff@example.com", "password": "staff-pass", "role": "organizer" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["role"], "organizer");
    let staff_id = created.body["id"].as_i64().unwrap();

    let searched = app.get("/api/admin/users?search=STAFF", Some(&admin)).await;
    assert_eq!(searched.body.as_array().unwrap().len(), 1);
    let everyone = app.get("/api/admin/users", Some(&admin)).await;
    assert_eq!(everyone.body.as_array().unwrap().len(), 3);

    let promoted = app
        .patch(
            &format!("/api/admin/users/{staff_id}"),
            Some(&admin),
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(promoted.body["role"], "admin");

    let self_delete = app
        .delete(&format!("/api/admin/users/{admin_id}"), Some(&admin))
        .await;
    assert_eq!(self_delete.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.delete(&format!("/api/admin/users/{staff_id}"), Some(&admin))
            .await
            .status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.delete(&format!("/api/admin/users/{staff_id}"), Some(&admin))
            .await
            .status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn profile_and_password_updates() {
    let app = TestApp::new().await;
    let (jane, jane_id) = app.register("jane", "user").await;
    let (_, bob_id) = app.register("bob", "user").await;

    let updated = app
        .patch(
            &format!("/api/user/{jane_id}"),
            Some(&jane),
            json!({ "fullName": "Jane Doe", "bio": "Music lover" }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["fullName"], "Jane Doe");

    let other = app
        .patch(&format!("/api/user/{bob_id}"), Some(&jane), json!({ "bio": "hacked" }))
        .await;
    assert_eq!(other.status, StatusCode::FORBIDDEN);

    let taken = app
        .patch(
            &format!("/api/user/{jane_id}"),
            Some(&jane),
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(taken.status, StatusCode::BAD_REQUEST);

    let password_uri = format!("/api/user/{jane_id}/password");
    let wrong = app
        .patch(
            &password_uri,
            Some(&jane),
            json!({ "currentPassword": "nope-nope", "newPassword": "fresh-pass" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let changed = app
        .patch(
            &password_uri,
            Some(&jane),
            json!({ "currentPassword": "secret-pass", "newPassword": "fresh-pass" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(app.login("jane", "secret-pass").await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("jane", "fresh-pass").await.status, StatusCode::OK);
}
