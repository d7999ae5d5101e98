// crates/search/src/ingest.rs
//! Bulk CSV ingestion into the people store.
//!
//! The file is stream-parsed row by row — never loaded whole — and rows
//! accumulate into one batch at a time. At most one batch is in flight: the
//! reader blocks on each commit, which is the back-pressure model. Large
//! batches (>= 100k) amortize ClickHouse insert overhead.

use crate::client::Analytics;
use crate::predicate::extract_pincode;
use crate::types::PersonRecord;
use crate::SearchResult;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_BATCH_SIZE: usize = 1_000;
pub const MAX_BATCH_SIZE: usize = 1_000_000;

/// Emit a progress callback every this many input rows.
const PROGRESS_INTERVAL: u64 = 50_000;

/// Zero-based column positions of the eight person fields in the input.
#[derive(Debug, Clone, Copy)]
pub struct FieldPositions {
    pub mobile: usize,
    pub name: usize,
    pub fname: usize,
    pub address: usize,
    pub alt: usize,
    pub circle: usize,
    pub master_id: usize,
    pub email: usize,
}

impl Default for FieldPositions {
    fn default() -> Self {
        Self {
            mobile: 0,
            name: 1,
            fname: 2,
            address: 3,
            alt: 4,
            circle: 5,
            master_id: 6,
            email: 7,
        }
    }
}

impl FieldPositions {
    fn max_index(&self) -> usize {
        [
            self.mobile,
            self.name,
            self.fname,
            self.address,
            self.alt,
            self.circle,
            self.master_id,
            self.email,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct CsvIngestOptions {
    /// Minted up front so callers can hand the id out before the job ends.
    pub job_id: Uuid,
    pub path: PathBuf,
    pub has_header: bool,
    pub batch_size: usize,
    pub positions: FieldPositions,
}

impl CsvIngestOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            path: path.into(),
            has_header: true,
            batch_size: 100_000,
            positions: FieldPositions::default(),
        }
    }

    fn clamped_batch_size(&self) -> usize {
        self.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
    }
}

/// Outcome of one ingest job.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReport {
    pub job_id: Uuid,
    pub total_rows: u64,
    pub processed_rows: u64,
    pub error_rows: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Map one CSV record onto a person row. Returns `None` for rows too short
/// to carry all eight fields; those count as errors and are skipped.
pub fn parse_record(record: &StringRecord, positions: &FieldPositions) -> Option<PersonRecord> {
    if record.len() <= positions.max_index() {
        return None;
    }
    let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
    let address = field(positions.address);
    let now = Utc::now();
    Some(PersonRecord {
        id: Uuid::new_v4(),
        master_id: field(positions.master_id),
        mobile: field(positions.mobile),
        name: field(positions.name),
        fname: field(positions.fname),
        pincode: extract_pincode(&address).unwrap_or_default(),
        address,
        alt: field(positions.alt),
        circle: field(positions.circle),
        email: field(positions.email),
        created_at: now,
        updated_at: now,
    })
}

async fn commit_batch(analytics: &Analytics, batch: &[PersonRecord]) -> SearchResult<()> {
    let mut insert = analytics.inner().insert::<PersonRecord>("people").await?;
    for row in batch {
        insert.write(row).await?;
    }
    insert.end().await?;
    Ok(())
}

/// Stream the file into the people store.
///
/// Commit failures mark the whole batch as errors and ingestion continues;
/// only an unreadable file aborts the job.
pub async fn ingest_csv(
    analytics: &Analytics,
    options: &CsvIngestOptions,
    mut on_progress: impl FnMut(u64),
) -> SearchResult<IngestReport> {
    let job_id = options.job_id;
    let started_at = Utc::now();
    let batch_size = options.clamped_batch_size();

    // flexible off: a row whose arity disagrees with the file comes back as
    // a csv::Error from the reader and is counted below, instead of being
    // silently reshaped before parse_record sees it.
    let mut reader = ReaderBuilder::new()
        .has_headers(options.has_header)
        .flexible(false)
        .trim(Trim::All)
        .from_path(&options.path)?;

    info!(%job_id, path = %options.path.display(), batch_size, "CSV ingest started");

    let mut total_rows: u64 = 0;
    let mut processed_rows: u64 = 0;
    let mut error_rows: u64 = 0;
    let mut batch: Vec<PersonRecord> = Vec::with_capacity(batch_size);

    for result in reader.records() {
        total_rows += 1;
        match result {
            Ok(record) => match parse_record(&record, &options.positions) {
                Some(person) => batch.push(person),
                None => error_rows += 1,
            },
            Err(e) => {
                warn!(%job_id, row = total_rows, error = %e, "Unparseable CSV row skipped");
                error_rows += 1;
            }
        }

        if batch.len() >= batch_size {
            match commit_batch(analytics, &batch).await {
                Ok(()) => processed_rows += batch.len() as u64,
                Err(e) => {
                    warn!(%job_id, rows = batch.len(), error = %e, "Batch commit failed");
                    error_rows += batch.len() as u64;
                }
            }
            batch.clear();
        }

        if total_rows % PROGRESS_INTERVAL == 0 {
            info!(%job_id, total_rows, processed_rows, error_rows, "CSV ingest progress");
            on_progress(total_rows);
        }
    }

    if !batch.is_empty() {
        match commit_batch(analytics, &batch).await {
            Ok(()) => processed_rows += batch.len() as u64,
            Err(e) => {
                warn!(%job_id, rows = batch.len(), error = %e, "Final batch commit failed");
                error_rows += batch.len() as u64;
            }
        }
    }

    let report = IngestReport {
        job_id,
        total_rows,
        processed_rows,
        error_rows,
        started_at,
        finished_at: Utc::now(),
    };
    info!(
        %job_id,
        total_rows = report.total_rows,
        processed_rows = report.processed_rows,
        error_rows = report.error_rows,
        "CSV ingest finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn parses_default_layout() {
        let rec = record(&[
            "9876543210",
            "Rahul Singh",
            "Raj Singh",
            "12 MG Road, 560001 Bangalore",
            "9876500000",
            "Karnataka",
            "MSTR-42",
            "rahul@example.com",
        ]);
        let person = parse_record(&rec, &FieldPositions::default()).unwrap();
        assert_eq!(person.mobile, "9876543210");
        assert_eq!(person.name, "Rahul Singh");
        assert_eq!(person.master_id, "MSTR-42");
        assert_eq!(person.email, "rahul@example.com");
        // Pincode materialized from the address.
        assert_eq!(person.pincode, "560001");
    }

    #[test]
    fn short_rows_are_rejected() {
        let rec = record(&["9876543210", "Rahul", "Raj"]);
        assert!(parse_record(&rec, &FieldPositions::default()).is_none());
    }

    #[test]
    fn address_without_pincode_leaves_it_empty() {
        let rec = record(&["1", "n", "f", "no pin here", "a", "c", "m", "e"]);
        let person = parse_record(&rec, &FieldPositions::default()).unwrap();
        assert_eq!(person.pincode, "");
    }

    #[test]
    fn custom_positions_remap_columns() {
        let positions = FieldPositions {
            mobile: 7,
            name: 0,
            fname: 1,
            address: 2,
            alt: 3,
            circle: 4,
            master_id: 5,
            email: 6,
            };
        let rec = record(&["n", "f", "addr", "alt", "c", "m", "e", "9876543210"]);
        let person = parse_record(&rec, &positions).unwrap();
        assert_eq!(person.mobile, "9876543210");
        assert_eq!(person.name, "n");
    }

    #[test]
    fn batch_size_is_clamped() {
        let mut options = CsvIngestOptions::new("/tmp/x.csv");
        options.batch_size = 10;
        assert_eq!(options.clamped_batch_size(), MIN_BATCH_SIZE);
        options.batch_size = 10_000_000;
        assert_eq!(options.clamped_batch_size(), MAX_BATCH_SIZE);
        options.batch_size = 250_000;
        assert_eq!(options.clamped_batch_size(), 250_000);
    }
}
