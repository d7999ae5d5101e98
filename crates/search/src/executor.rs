// crates/search/src/executor.rs
//! Query execution against the people store.
//!
//! Every search runs two queries sharing one predicate fragment: an exact
//! `count()` and a page fetch ordered by the physical key. Sharing the
//! fragment is what keeps `total_count` and `results` describing the same
//! set; ordering by `(mobile, name, master_id)` is what keeps increasing
//! offsets enumerating distinct rows even while ingestion appends.

use crate::client::Analytics;
use crate::predicate::Predicate;
use crate::types::{PersonRecord, SearchPerformanceRecord};
use crate::{SearchError, SearchResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Column list matching the field order of [`PersonRecord`]; RowBinary
/// decoding is positional.
pub const PERSON_COLUMNS: &str =
    "id, master_id, mobile, name, fname, address, alt, circle, email, pincode, \
     created_at, updated_at";

const PAGE_ORDER: &str = "ORDER BY mobile, name, master_id";

/// How long the table-size estimate for stats stays fresh.
const TOTAL_RECORDS_TTL: Duration = Duration::from_secs(60);

/// Result of one count + page pass.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub results: Vec<PersonRecord>,
    pub total_count: u64,
    pub execution_time_ms: u64,
}

impl SearchPage {
    pub fn has_more(&self, offset: u64) -> bool {
        offset + (self.results.len() as u64) < self.total_count
    }
}

/// Result of an enhanced-mobile pass: direct hits first, then the
/// master-id fan-out.
#[derive(Debug, Clone)]
pub struct EnhancedMobilePage {
    pub direct_matches: Vec<PersonRecord>,
    pub master_id_matches: Vec<PersonRecord>,
    pub total_direct: u64,
    pub total_master_id: u64,
    pub master_ids: Vec<String>,
    pub execution_time_ms: u64,
}

impl EnhancedMobilePage {
    pub fn total(&self) -> u64 {
        self.total_direct + self.total_master_id
    }

    pub fn has_more(&self, offset: u64) -> bool {
        let returned = (self.direct_matches.len() + self.master_id_matches.len()) as u64;
        offset + returned < self.total()
    }
}

/// Executor over the analytic store. Clone-cheap; the stats cache is shared.
#[derive(Clone)]
pub struct SearchExecutor {
    analytics: Analytics,
    total_cache: Arc<RwLock<Option<(Instant, u64)>>>,
}

impl SearchExecutor {
    pub fn new(analytics: Analytics) -> Self {
        Self {
            analytics,
            total_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Run the count + page pair for a predicate. `limit` must already be
    /// resolved through [`crate::types::effective_limit`].
    pub async fn run(
        &self,
        predicate: &Predicate,
        limit: u64,
        offset: u64,
    ) -> SearchResult<SearchPage> {
        let start = Instant::now();

        let count_sql = format!("SELECT count() FROM people WHERE {}", predicate.clause());
        let mut count_query = self.analytics.inner().query(&count_sql);
        for param in predicate.params() {
            count_query = count_query.bind(param.as_str());
        }
        let total_count = count_query.fetch_one::<u64>().await?;

        let page_sql = format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE {} {PAGE_ORDER} LIMIT ? OFFSET ?",
            predicate.clause()
        );
        let mut page_query = self.analytics.inner().query(&page_sql);
        for param in predicate.params() {
            page_query = page_query.bind(param.as_str());
        }
        let results = page_query
            .bind(limit)
            .bind(offset)
            .fetch_all::<PersonRecord>()
            .await?;

        Ok(SearchPage {
            results,
            total_count,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Point lookup by row id.
    pub async fn get_person(&self, id: Uuid) -> SearchResult<Option<PersonRecord>> {
        let sql = format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = toUUID(?)");
        let person = self
            .analytics
            .inner()
            .query(&sql)
            .bind(id.to_string())
            .fetch_optional::<PersonRecord>()
            .await?;
        Ok(person)
    }

    /// Total row count with a lazily refreshed 60 s cache — stats calls must
    /// not count 10^8 rows on every hit.
    pub async fn total_records(&self) -> SearchResult<u64> {
        {
            let cache = self.total_cache.read().await;
            if let Some((refreshed_at, count)) = *cache {
                if refreshed_at.elapsed() < TOTAL_RECORDS_TTL {
                    return Ok(count);
                }
            }
        }
        let count = self
            .analytics
            .inner()
            .query("SELECT count() FROM people")
            .fetch_one::<u64>()
            .await?;
        *self.total_cache.write().await = Some((Instant::now(), count));
        Ok(count)
    }

    /// Append a row to the `search_performance` log. Callers treat failures
    /// as non-fatal.
    pub async fn record_performance(
        &self,
        search_id: Uuid,
        user_id: Uuid,
        fingerprint: &str,
        result_count: u64,
        execution_time_ms: u64,
    ) -> SearchResult<()> {
        let mut insert = self.analytics.inner().insert::<SearchPerformanceRecord>("search_performance").await?;
        insert
            .write(&SearchPerformanceRecord {
                search_id,
                user_id,
                fingerprint: fingerprint.to_string(),
                result_count,
                execution_time_ms,
                recorded_at: Utc::now(),
            })
            .await?;
        insert.end().await?;
        Ok(())
    }

    /// Enhanced mobile search: direct matches on `mobile`/`alt`, then every
    /// other row sharing a `master_id` with a direct match. Pagination runs
    /// across the union, direct rows first.
    pub async fn enhanced_mobile(
        &self,
        mobile_number: &str,
        limit: u64,
        offset: u64,
    ) -> SearchResult<EnhancedMobilePage> {
        let number = mobile_number.trim();
        if number.is_empty() {
            return Err(SearchError::InvalidQuery("mobile_number is required".into()));
        }
        let start = Instant::now();

        let total_direct = self
            .analytics
            .inner()
            .query("SELECT count() FROM people WHERE mobile = ? OR alt = ?")
            .bind(number)
            .bind(number)
            .fetch_one::<u64>()
            .await?;

        // Grouping keys seen among the direct matches, blanks excluded.
        let master_ids = self
            .analytics
            .inner()
            .query(
                "SELECT DISTINCT master_id FROM people \
                 WHERE (mobile = ? OR alt = ?) AND master_id != '' \
                 ORDER BY master_id",
            )
            .bind(number)
            .bind(number)
            .fetch_all::<String>()
            .await?;

        let fanout_clause = if master_ids.is_empty() {
            None
        } else {
            let placeholders = vec!["?"; master_ids.len()].join(",");
            Some(format!(
                "master_id IN ({placeholders}) AND NOT (mobile = ? OR alt = ?)"
            ))
        };

        let total_master_id = match &fanout_clause {
            None => 0,
            Some(clause) => {
                let sql = format!("SELECT count() FROM people WHERE {clause}");
                let mut query = self.analytics.inner().query(&sql);
                for id in &master_ids {
                    query = query.bind(id.as_str());
                }
                query.bind(number).bind(number).fetch_one::<u64>().await?
            }
        };

        // Direct slice of the union window, then fan-out fills the rest.
        let mut direct_matches = Vec::new();
        let mut master_id_matches = Vec::new();
        let mut remaining = limit;
        if offset < total_direct && remaining > 0 {
            let sql = format!(
                "SELECT {PERSON_COLUMNS} FROM people \
                 WHERE mobile = ? OR alt = ? {PAGE_ORDER} LIMIT ? OFFSET ?"
            );
            direct_matches = self
                .analytics
                .inner()
                .query(&sql)
                .bind(number)
                .bind(number)
                .bind(remaining)
                .bind(offset)
                .fetch_all::<PersonRecord>()
                .await?;
            remaining -= direct_matches.len() as u64;
        }
        if let Some(clause) = &fanout_clause {
            let fanout_offset = offset.saturating_sub(total_direct);
            if remaining > 0 && fanout_offset < total_master_id {
                let sql = format!(
                    "SELECT {PERSON_COLUMNS} FROM people WHERE {clause} \
                     ORDER BY master_id, mobile, name LIMIT ? OFFSET ?"
                );
                let mut query = self.analytics.inner().query(&sql);
                for id in &master_ids {
                    query = query.bind(id.as_str());
                }
                master_id_matches = query
                    .bind(number)
                    .bind(number)
                    .bind(remaining)
                    .bind(fanout_offset)
                    .fetch_all::<PersonRecord>()
                    .await?;
            }
        }

        Ok(EnhancedMobilePage {
            direct_matches,
            master_id_matches,
            total_direct,
            total_master_id,
            master_ids,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(mobile: &str) -> PersonRecord {
        PersonRecord {
            id: Uuid::new_v4(),
            master_id: "M1".into(),
            mobile: mobile.into(),
            name: "Name".into(),
            fname: "FName".into(),
            address: "Addr".into(),
            alt: String::new(),
            circle: "Delhi".into(),
            email: String::new(),
            pincode: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn has_more_matches_offset_arithmetic() {
        let page = SearchPage {
            results: vec![person("1"), person("2")],
            total_count: 5,
            execution_time_ms: 1,
        };
        assert!(page.has_more(0));
        assert!(page.has_more(2));
        assert!(!page.has_more(3)); // 3 + 2 == 5

        let empty = SearchPage {
            results: vec![],
            total_count: 0,
            execution_time_ms: 0,
        };
        assert!(!empty.has_more(0));
        assert!(!empty.has_more(100)); // offset past the end
    }

    #[test]
    fn enhanced_page_totals() {
        let page = EnhancedMobilePage {
            direct_matches: vec![person("9876543210")],
            master_id_matches: vec![person("9876500000")],
            total_direct: 1,
            total_master_id: 3,
            master_ids: vec!["M1".into()],
            execution_time_ms: 1,
        };
        assert_eq!(page.total(), 4);
        assert!(page.has_more(0)); // 0 + 2 < 4
        assert!(!page.has_more(2)); // 2 + 2 == 4
    }

    #[test]
    fn person_columns_match_record_field_order() {
        // RowBinary is positional; a drifted column list silently corrupts
        // every decoded row.
        let fields = [
            "id", "master_id", "mobile", "name", "fname", "address", "alt", "circle",
            "email", "pincode", "created_at", "updated_at",
        ];
        let columns: Vec<&str> = PERSON_COLUMNS.split(',').map(str::trim).collect();
        assert_eq!(columns, fields);
    }
}
