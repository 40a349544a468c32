use axum::http::{header, HeaderMap};
use chrono::Duration;

pub const SESSION_COOKIE: &str = "sid";

/// `Set-Cookie` value that stores `token` for `ttl`.
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    build(token, ttl.num_seconds(), secure)
}

/// `Set-Cookie` value that makes the browser drop the session.
pub fn clear_session_cookie(secure: bool) -> String {
    build("", 0, secure)
}

fn build(value: &str, max_age: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Finds the session token among every `Cookie` header of the request.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
