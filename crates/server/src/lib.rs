// crates/server/src/lib.rs
//! finone server library.
//!
//! Axum-based HTTP API for the people-search service: authentication and
//! sessions, quota-guarded search over the analytic store, administration,
//! and the background scheduler.

pub mod auth;
pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use auth::{AdminUser, AuthService, CurrentUser};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::api_routes;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use state::AppState;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum::Router;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin)
}

/// A panicking handler becomes a 500 with the standard envelope; the
/// process keeps serving.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> axum::response::Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("panic");
    tracing::error!(panic = %detail, "Request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("UpstreamFailure")),
    )
        .into_response()
}

/// Map errors from the fallible timeout middleware back into the standard
/// envelope: an elapsed deadline is ServiceBusy, anything else a 500.
async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<ErrorResponse>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request deadline elapsed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("ServiceBusy")),
        )
    } else {
        tracing::error!(error = %err, "Middleware failure");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("UpstreamFailure")),
        )
    }
}

/// Create the Axum application with all routes and middleware.
///
/// Outermost to innermost: panic containment, request tracing, CORS, the
/// per-request deadline, and the body cap sized for CSV uploads. The
/// timeout service is fallible, so it sits behind a `HandleErrorLayer`
/// that converts its `BoxError` into a response before the router sees it.
pub fn create_app(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.timeout_secs);
    let body_limit = state.config.limits.max_upload_size;
    routes::api_routes(state)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(timeout)),
        )
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn app_builds_with_all_layers() {
        let state = crate::state::tests::test_state();
        let _app = create_app(state);
    }
}
