// crates/search/src/types.rs
//! Request/response types for the search surface.

use crate::{SearchError, SearchResult};
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Hard cap on page size; requests above it are rejected.
pub const MAX_PAGE_SIZE: u64 = 10_000;

/// Page size applied when the request leaves `limit` at 0.
pub const DEFAULT_PAGE_SIZE: u64 = 1_000;

/// How per-field predicates combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub fn sql(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

/// Substring (case-insensitive) vs exact equality matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Partial,
    Full,
}

/// A typed search request. Three shapes normalize into one predicate tree:
/// a bare `query` (disjunction over all fields), `query` + `fields`, or a
/// per-field `field_queries` map (which takes precedence over both).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    pub fields: Vec<String>,
    /// BTreeMap keeps iteration (and thus SQL and fingerprints) in a
    /// canonical order regardless of how the client ordered keys.
    pub field_queries: BTreeMap<String, String>,
    pub logic: Logic,
    pub match_type: MatchType,
    pub enhanced_mobile: bool,
    pub limit: u64,
    pub offset: u64,
}

/// Resolve the requested page size against the default and the hard cap.
pub fn effective_limit(limit: u64) -> SearchResult<u64> {
    if limit == 0 {
        return Ok(DEFAULT_PAGE_SIZE);
    }
    if limit > MAX_PAGE_SIZE {
        return Err(SearchError::InvalidQuery(format!(
            "limit {limit} exceeds the maximum of {MAX_PAGE_SIZE}"
        )));
    }
    Ok(limit)
}

/// One row of the `people` table. Field order must match the column order
/// in [`crate::executor::PERSON_COLUMNS`]; RowBinary is positional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct PersonRecord {
    #[serde(with = "clickhouse::serde::uuid")]
    pub id: Uuid,
    pub master_id: String,
    pub mobile: String,
    pub name: String,
    pub fname: String,
    pub address: String,
    pub alt: String,
    pub circle: String,
    pub email: String,
    pub pincode: String,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub updated_at: DateTime<Utc>,
}

/// Row for the `search_performance` log table.
#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct SearchPerformanceRecord {
    #[serde(with = "clickhouse::serde::uuid")]
    pub search_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub user_id: Uuid,
    pub fingerprint: String,
    pub result_count: u64,
    pub execution_time_ms: u64,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_zero_takes_default() {
        assert_eq!(effective_limit(0).unwrap(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn limit_above_cap_rejected() {
        assert_eq!(effective_limit(MAX_PAGE_SIZE).unwrap(), MAX_PAGE_SIZE);
        assert!(effective_limit(MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: SearchRequest = serde_json::from_str(r#"{"query":"singh"}"#).unwrap();
        assert_eq!(req.query, "singh");
        assert_eq!(req.logic, Logic::And);
        assert_eq!(req.match_type, MatchType::Partial);
        assert_eq!(req.limit, 0);
        assert!(req.fields.is_empty());
    }

    #[test]
    fn logic_and_match_type_wire_format() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query":"x","logic":"OR","match_type":"full"}"#).unwrap();
        assert_eq!(req.logic, Logic::Or);
        assert_eq!(req.match_type, MatchType::Full);
    }
}
