// crates/server/src/routes/search.rs
//! Search surface.
//!
//! - POST /search/ — predicate search with exact total counts
//! - POST /search/within — refine a prior search by id
//! - POST /search/enhanced-mobile — direct + master-id fan-out for a number
//! - GET  /search/person/{id} — point lookup
//! - GET  /search/stats — dataset and latency aggregates
//! - POST /search/export — synchronous CSV download of a search
//!
//! Quota is reserved before execution and handed back on any failure, so
//! only fully successful calls consume it. Every attempt past the reserve
//! writes an audit row; the canonical structured query stored there is what
//! search-within rebuilds predicates from.

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use finone_core::User;
use finone_db::{SearchLogEntry, UsageKind, SEARCH_STATUS_FAILED, SEARCH_STATUS_OK};
use finone_search::types::{Logic, MatchType, SearchRequest};
use finone_search::{
    build_predicate, effective_limit, EnhancedMobilePage, PersonRecord, Predicate, SearchPage,
    MAX_PAGE_SIZE,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", post(search))
        .route("/search/", post(search))
        .route("/search/within", post(search_within))
        .route("/search/enhanced-mobile", post(enhanced_mobile))
        .route("/search/person/{id}", get(person))
        .route("/search/stats", get(stats))
        .route("/search/export", post(export))
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub search_id: Uuid,
    pub results: Vec<PersonRecord>,
    pub total_count: u64,
    pub execution_time_ms: u64,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchWithinRequest {
    pub search_id: Uuid,
    #[serde(flatten)]
    pub refinement: SearchRequest,
}

#[derive(Debug, Deserialize)]
pub struct EnhancedMobileRequest {
    pub mobile_number: String,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Serialize)]
pub struct EnhancedMobileResponse {
    pub search_id: Uuid,
    pub direct_matches: Vec<PersonRecord>,
    pub master_id_matches: Vec<PersonRecord>,
    pub total_direct: u64,
    pub total_master_id: u64,
    pub total_count: u64,
    pub master_ids: Vec<String>,
    pub execution_time_ms: u64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_records: u64,
    pub avg_search_time_ms: f64,
    pub searches_last_24h: i64,
}

/// Reserve one unit of the user's daily quota or fail with 429.
async fn reserve(state: &AppState, user: &User, kind: UsageKind) -> ApiResult<()> {
    let max = match kind {
        UsageKind::Search => user.max_searches_per_day,
        UsageKind::Export => user.max_exports_per_day,
    };
    state
        .db
        .reserve_usage(user.id, state.today(), kind, max)
        .await?
        .map(|_| ())
        .ok_or(ApiError::QuotaExceeded)
}

/// Hand a reservation back after a failure. Best effort: a failed release
/// only costs the user one quota unit, it never masks the original error.
async fn release(state: &AppState, user_id: Uuid, kind: UsageKind) {
    if let Err(e) = state.db.release_usage(user_id, state.today(), kind).await {
        tracing::warn!(error = %e, %user_id, "Failed to release quota reservation");
    }
}

/// Write the failure-marker audit row for an attempt that passed quota
/// reserve but died in the executor.
async fn audit_failure(
    state: &AppState,
    user_id: Uuid,
    canonical: serde_json::Value,
    fingerprint: &str,
) {
    let entry = SearchLogEntry {
        id: Uuid::new_v4(),
        user_id,
        query: canonical,
        fingerprint: fingerprint.to_string(),
        result_count: 0,
        execution_time_ms: 0,
        status: SEARCH_STATUS_FAILED,
    };
    if let Err(e) = state.db.insert_search_log(&entry).await {
        tracing::warn!(error = %e, %user_id, "Failed to write failure audit row");
    }
}

/// Common tail of every successful search: audit row (mandatory — on
/// failure the reservation is released and the call errors), then the
/// fire-and-forget performance record.
async fn finish_search(
    state: &Arc<AppState>,
    user_id: Uuid,
    canonical: serde_json::Value,
    fingerprint: String,
    result_count: u64,
    execution_time_ms: u64,
) -> ApiResult<Uuid> {
    let search_id = Uuid::new_v4();
    let entry = SearchLogEntry {
        id: search_id,
        user_id,
        query: canonical,
        fingerprint: fingerprint.clone(),
        result_count: result_count as i64,
        execution_time_ms: execution_time_ms as i64,
        status: SEARCH_STATUS_OK,
    };
    if let Err(e) = state.db.insert_search_log(&entry).await {
        release(state, user_id, UsageKind::Search).await;
        return Err(e.into());
    }

    let executor = state.executor.clone();
    tokio::spawn(async move {
        if let Err(e) = executor
            .record_performance(search_id, user_id, &fingerprint, result_count, execution_time_ms)
            .await
        {
            tracing::warn!(error = %e, %search_id, "Failed to record search performance");
        }
    });

    Ok(search_id)
}

/// Run a predicate through quota reserve, the executor, and the audit tail.
async fn run_guarded(
    state: &Arc<AppState>,
    current: &CurrentUser,
    predicate: &Predicate,
    canonical: serde_json::Value,
    limit: u64,
    offset: u64,
) -> ApiResult<(SearchPage, Uuid)> {
    reserve(state, &current.user, UsageKind::Search).await?;

    let page = match state.executor.run(predicate, limit, offset).await {
        Ok(page) => page,
        Err(e) => {
            release(state, current.user.id, UsageKind::Search).await;
            audit_failure(state, current.user.id, canonical, predicate.fingerprint()).await;
            return Err(e.into());
        }
    };

    let search_id = finish_search(
        state,
        current.user.id,
        canonical,
        predicate.fingerprint().to_string(),
        page.total_count,
        page.execution_time_ms,
    )
    .await?;
    Ok((page, search_id))
}

/// POST /api/v1/search
async fn search(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let limit = effective_limit(request.limit)?;
    let predicate = build_predicate(&request)?;
    let canonical = serde_json::to_value(&request)
        .map_err(|e| ApiError::UpstreamFailure(format!("request serialization: {e}")))?;

    let (page, search_id) =
        run_guarded(&state, &current, &predicate, canonical, limit, request.offset).await?;

    tracing::info!(
        user_id = %current.user.id,
        %search_id,
        total_count = page.total_count,
        execution_time_ms = page.execution_time_ms,
        "Search complete"
    );
    let has_more = page.has_more(request.offset);
    Ok(Json(SearchResponse {
        search_id,
        total_count: page.total_count,
        execution_time_ms: page.execution_time_ms,
        has_more,
        results: page.results,
    }))
}

/// Rebuild a predicate from the canonical structured query stored in an
/// audit row. Refined searches store `{base, refine}` pairs, so recovery
/// recurses; everything else is a plain [`SearchRequest`].
fn predicate_from_stored(value: &serde_json::Value) -> ApiResult<Predicate> {
    if let Some(object) = value.as_object() {
        if let (Some(base), Some(refine)) = (object.get("base"), object.get("refine")) {
            return Ok(predicate_from_stored(base)?.and(predicate_from_stored(refine)?));
        }
    }
    let request: SearchRequest = serde_json::from_value(value.clone())
        .map_err(|e| ApiError::UpstreamFailure(format!("stored query unreadable: {e}")))?;
    build_predicate(&request).map_err(ApiError::from)
}

/// POST /api/v1/search/within — conjoin a stored predicate with a new one.
async fn search_within(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(request): Json<SearchWithinRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let limit = effective_limit(request.refinement.limit)?;
    let refinement_predicate = build_predicate(&request.refinement)?;

    let stored = state
        .db
        .get_search_for_within(request.search_id, current.user.id, Utc::now())
        .await?
        .ok_or(ApiError::ExpiredSearchId)?;
    let previous = predicate_from_stored(&stored.query)?;
    let combined = previous.and(refinement_predicate);

    let refinement_json = serde_json::to_value(&request.refinement)
        .map_err(|e| ApiError::UpstreamFailure(format!("request serialization: {e}")))?;
    let canonical = json!({ "base": stored.query, "refine": refinement_json });

    let (page, search_id) = run_guarded(
        &state,
        &current,
        &combined,
        canonical,
        limit,
        request.refinement.offset,
    )
    .await?;

    let has_more = page.has_more(request.refinement.offset);
    Ok(Json(SearchResponse {
        search_id,
        total_count: page.total_count,
        execution_time_ms: page.execution_time_ms,
        has_more,
        results: page.results,
    }))
}

/// The canonical structured form of an enhanced-mobile search: an exact
/// disjunction over `mobile`/`alt`. Stored in the audit row, it is also a
/// valid search-within base.
fn enhanced_mobile_canonical(number: &str) -> SearchRequest {
    SearchRequest {
        field_queries: [
            ("mobile".to_string(), number.to_string()),
            ("alt".to_string(), number.to_string()),
        ]
        .into_iter()
        .collect(),
        logic: Logic::Or,
        match_type: MatchType::Full,
        enhanced_mobile: true,
        ..SearchRequest::default()
    }
}

/// POST /api/v1/search/enhanced-mobile
async fn enhanced_mobile(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(request): Json<EnhancedMobileRequest>,
) -> ApiResult<Json<EnhancedMobileResponse>> {
    let limit = effective_limit(request.limit)?;
    let number = request.mobile_number.trim().to_string();
    if number.is_empty() {
        return Err(ApiError::InvalidRequest("mobile_number is required".into()));
    }

    let canonical_request = enhanced_mobile_canonical(&number);
    let fingerprint = build_predicate(&canonical_request)?.fingerprint().to_string();
    let canonical = serde_json::to_value(&canonical_request)
        .map_err(|e| ApiError::UpstreamFailure(format!("request serialization: {e}")))?;

    reserve(&state, &current.user, UsageKind::Search).await?;

    let page: EnhancedMobilePage = match state
        .executor
        .enhanced_mobile(&number, limit, request.offset)
        .await
    {
        Ok(page) => page,
        Err(e) => {
            release(&state, current.user.id, UsageKind::Search).await;
            audit_failure(&state, current.user.id, canonical, &fingerprint).await;
            return Err(e.into());
        }
    };

    let search_id = finish_search(
        &state,
        current.user.id,
        canonical,
        fingerprint,
        page.total(),
        page.execution_time_ms,
    )
    .await?;

    let has_more = page.has_more(request.offset);
    Ok(Json(EnhancedMobileResponse {
        search_id,
        total_direct: page.total_direct,
        total_master_id: page.total_master_id,
        total_count: page.total(),
        master_ids: page.master_ids,
        execution_time_ms: page.execution_time_ms,
        has_more,
        direct_matches: page.direct_matches,
        master_id_matches: page.master_id_matches,
    }))
}

/// GET /api/v1/search/person/{id}
async fn person(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PersonRecord>> {
    let person = state
        .executor
        .get_person(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("person {id}")))?;
    Ok(Json(person))
}

/// GET /api/v1/search/stats
async fn stats(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
) -> ApiResult<Json<StatsResponse>> {
    let total_records = state.executor.total_records().await?;
    let log_stats = state.db.search_log_stats(Utc::now()).await?;
    Ok(Json(StatsResponse {
        total_records,
        avg_search_time_ms: log_stats.avg_execution_ms,
        searches_last_24h: log_stats.searches_last_24h,
    }))
}

const EXPORT_COLUMNS: [&str; 10] = [
    "id", "master_id", "mobile", "name", "fname", "address", "alt", "circle", "email", "pincode",
];

fn render_csv(rows: &[PersonRecord]) -> ApiResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let io_err = |e: csv::Error| ApiError::UpstreamFailure(format!("csv rendering: {e}"));
    writer.write_record(EXPORT_COLUMNS).map_err(io_err)?;
    for row in rows {
        writer
            .write_record([
                row.id.to_string().as_str(),
                &row.master_id,
                &row.mobile,
                &row.name,
                &row.fname,
                &row.address,
                &row.alt,
                &row.circle,
                &row.email,
                &row.pincode,
            ])
            .map_err(io_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::UpstreamFailure(format!("csv rendering: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ApiError::UpstreamFailure(format!("csv encoding: {e}")))
}

/// POST /api/v1/search/export — synchronous CSV download, capped at
/// `limits.max_rows_per_search` rows, charged against the export quota.
async fn export(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Response> {
    let predicate = build_predicate(&request)?;
    let cap = state.config.limits.max_rows_per_search.min(MAX_PAGE_SIZE);

    reserve(&state, &current.user, UsageKind::Export).await?;

    let page = match state.executor.run(&predicate, cap, 0).await {
        Ok(page) => page,
        Err(e) => {
            release(&state, current.user.id, UsageKind::Export).await;
            return Err(e.into());
        }
    };

    let body = match render_csv(&page.results) {
        Ok(body) => body,
        Err(e) => {
            release(&state, current.user.id, UsageKind::Export).await;
            return Err(e);
        }
    };

    if let Err(e) = state
        .db
        .record_export(current.user.id, None, page.results.len() as i64)
        .await
    {
        release(&state, current.user.id, UsageKind::Export).await;
        return Err(e.into());
    }

    tracing::info!(
        user_id = %current.user.id,
        rows = page.results.len(),
        total_count = page.total_count,
        "Export complete"
    );
    let disposition = format!(
        "attachment; filename=\"people-export-{}.csv\"",
        Utc::now().format("%Y%m%d-%H%M%S")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn within_request_flattens_refinement() {
        let body = r#"{"search_id":"8c4b8b3e-60f7-4f0b-9dab-94d62ad8e858",
                       "query":"singh","fields":["name"],"limit":200}"#;
        let request: SearchWithinRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.refinement.query, "singh");
        assert_eq!(request.refinement.limit, 200);
    }

    #[test]
    fn stored_predicate_recovery_round_trips() {
        let request = SearchRequest {
            query: "singh".into(),
            ..SearchRequest::default()
        };
        let stored = serde_json::to_value(&request).unwrap();
        let direct = build_predicate(&request).unwrap();
        let recovered = predicate_from_stored(&stored).unwrap();
        assert_eq!(recovered.fingerprint(), direct.fingerprint());
        assert_eq!(recovered.clause(), direct.clause());
    }

    #[test]
    fn stored_predicate_recovery_recurses_into_refinements() {
        let base = serde_json::to_value(SearchRequest {
            query: "singh".into(),
            ..SearchRequest::default()
        })
        .unwrap();
        let refine = serde_json::to_value(SearchRequest {
            query: "delhi".into(),
            fields: vec!["circle".into()],
            ..SearchRequest::default()
        })
        .unwrap();
        let stored = json!({ "base": base, "refine": refine });

        let predicate = predicate_from_stored(&stored).unwrap();
        assert!(predicate.clause().contains(" AND (circle ILIKE ?)"));
        assert!(predicate.fingerprint().contains(">>"));
    }

    #[test]
    fn stored_garbage_is_an_upstream_failure() {
        let err = predicate_from_stored(&json!({"query": 42})).unwrap_err();
        assert!(matches!(err, ApiError::UpstreamFailure(_)));
    }

    #[test]
    fn enhanced_mobile_canonical_is_exact_disjunction() {
        let canonical = enhanced_mobile_canonical("9876543210");
        let predicate = build_predicate(&canonical).unwrap();
        assert_eq!(predicate.clause(), "(alt = ? OR mobile = ?)");
        assert_eq!(predicate.params(), ["9876543210", "9876543210"]);
    }

    #[test]
    fn csv_rendering_includes_header_and_rows() {
        let row = PersonRecord {
            id: Uuid::nil(),
            master_id: "M1".into(),
            mobile: "9876543210".into(),
            name: "Rahul, Singh".into(),
            fname: "Raj".into(),
            address: "110001 Delhi".into(),
            alt: String::new(),
            circle: "Delhi".into(),
            email: "r@example.com".into(),
            pincode: "110001".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let body = render_csv(&[row]).unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next().unwrap().split(',').count(), EXPORT_COLUMNS.len());
        // Embedded comma survives quoting.
        assert!(body.contains("\"Rahul, Singh\""));
    }
}
