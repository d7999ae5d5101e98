// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use finone_db::DbError;
use finone_search::SearchError;
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error envelope for API errors.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error kinds. Each maps 1:1 to an HTTP status and a stable machine
/// tag; authentication failures deliberately carry no detail about which
/// factor was wrong.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid session")]
    InvalidSession,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("daily quota exceeded")]
    QuotaExceeded,

    #[error("search id expired or unknown")]
    ExpiredSearchId,

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("service busy")]
    ServiceBusy,

    #[error("ingestion error: {0}")]
    IngestionError(String),
}

impl ApiError {
    /// The stable machine tag sent on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "InvalidRequest",
            ApiError::InvalidCredentials => "InvalidCredentials",
            ApiError::InvalidSession => "InvalidSession",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::QuotaExceeded => "QuotaExceeded",
            ApiError::ExpiredSearchId => "ExpiredSearchId",
            ApiError::UpstreamFailure(_) => "UpstreamFailure",
            ApiError::ServiceBusy => "ServiceBusy",
            ApiError::IngestionError(_) => "IngestionError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::InvalidSession => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::ExpiredSearchId => StatusCode::NOT_FOUND,
            ApiError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamFailure(_) | ApiError::IngestionError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceBusy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        if e.is_pool_timeout() {
            ApiError::ServiceBusy
        } else if e.is_unique_violation() {
            ApiError::InvalidRequest("duplicate value for a unique field".into())
        } else {
            ApiError::UpstreamFailure(e.to_string())
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidQuery(msg) => ApiError::InvalidRequest(msg),
            SearchError::Upstream(e) => ApiError::UpstreamFailure(e.to_string()),
            SearchError::Ingestion(msg) => ApiError::IngestionError(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // Never hint at which factor failed.
            ApiError::InvalidCredentials | ApiError::InvalidSession => {
                tracing::warn!(kind = self.tag(), "Authentication failure");
                ErrorResponse::new(self.tag())
            }
            ApiError::QuotaExceeded => {
                tracing::warn!(kind = self.tag(), "Quota rejection");
                ErrorResponse::new(self.tag())
            }
            ApiError::UpstreamFailure(details) | ApiError::IngestionError(details) => {
                tracing::error!(kind = self.tag(), error = %details, "Upstream failure");
                // 500s keep their internals out of the response body.
                ErrorResponse::new(self.tag())
            }
            ApiError::ServiceBusy => {
                tracing::warn!(kind = self.tag(), "Pool exhausted");
                ErrorResponse::new(self.tag())
            }
            ApiError::InvalidRequest(details)
            | ApiError::Forbidden(details)
            | ApiError::NotFound(details) => {
                tracing::warn!(kind = self.tag(), details = %details, "Request rejected");
                ErrorResponse::with_details(self.tag(), details.clone())
            }
            ApiError::ExpiredSearchId => ErrorResponse::new(self.tag()),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
