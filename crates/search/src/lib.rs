// crates/search/src/lib.rs
//! Search over the columnar people store.
//!
//! ClickHouse holds one append-only `people` table (>10^8 rows) ordered by
//! `(mobile, name, master_id)` with Bloom-filter skipping indexes. This crate
//! turns typed search requests into index-friendly parameterized SQL, runs
//! the paired count + page queries, and streams CSV imports in.

pub mod client;
pub mod executor;
pub mod ingest;
pub mod predicate;
pub mod schema;
pub mod types;

pub use client::Analytics;
pub use executor::{EnhancedMobilePage, SearchExecutor, SearchPage};
pub use ingest::{ingest_csv, CsvIngestOptions, FieldPositions, IngestReport};
pub use predicate::{build_predicate, extract_pincode, Predicate, SEARCHABLE_FIELDS};
pub use types::{effective_limit, Logic, MatchType, PersonRecord, SearchRequest, MAX_PAGE_SIZE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Request rejected before touching the store.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The analytic store failed mid-query.
    #[error("analytic store error: {0}")]
    Upstream(#[from] clickhouse::error::Error),

    #[error("ingestion error: {0}")]
    Ingestion(String),
}

impl From<std::io::Error> for SearchError {
    fn from(e: std::io::Error) -> Self {
        SearchError::Ingestion(e.to_string())
    }
}

impl From<csv::Error> for SearchError {
    fn from(e: csv::Error) -> Self {
        SearchError::Ingestion(e.to_string())
    }
}

pub type SearchResult<T> = Result<T, SearchError>;
