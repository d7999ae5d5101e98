// crates/server/src/routes/mod.rs
//! API route handlers, one module per surface.

pub mod admin;
pub mod auth;
pub mod health;
pub mod search;
pub mod users;

use crate::state::AppState;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::Router;

/// Combined API router under the `/api/v1` prefix.
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(health::router())
                .merge(auth::router())
                .merge(users::router())
                .merge(search::router())
                .merge(admin::router()),
        )
        .with_state(state)
}

/// Best-effort client address: first X-Forwarded-For hop, else X-Real-IP.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn api_routes_build() {
        let state = crate::state::tests::test_state();
        let _router = api_routes(state);
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers).unwrap(), "203.0.113.9");

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers).unwrap(), "198.51.100.2");

        headers.remove("x-real-ip");
        assert!(client_ip(&headers).is_none());
    }
}
