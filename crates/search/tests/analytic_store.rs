// crates/search/tests/analytic_store.rs
//! Integration tests against a live ClickHouse.
//!
//! Run with a scratch database:
//!     FINONE_TEST_CLICKHOUSE=http://localhost:8123 \
//!         cargo test -p finone-search -- --ignored

use finone_core::config::ClickhouseConfig;
use finone_search::types::SearchRequest;
use finone_search::{
    build_predicate, effective_limit, ingest_csv, Analytics, CsvIngestOptions, SearchExecutor,
};
use std::io::Write;

fn test_analytics() -> Analytics {
    let url = std::env::var("FINONE_TEST_CLICKHOUSE")
        .expect("FINONE_TEST_CLICKHOUSE must point at a scratch ClickHouse");
    let config = ClickhouseConfig {
        url,
        database: "finone_test".into(),
        ..ClickhouseConfig::default()
    };
    Analytics::connect(&config)
}

fn fixture_csv(rows: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "mobile,name,fname,address,alt,circle,master_id,email").unwrap();
    for i in 0..rows {
        writeln!(
            file,
            "98765{i:05},Singh {i},Father {i},\"House {i}, 110001 Delhi\",,Delhi,GRP{},s{i}@example.com",
            i % 10
        )
        .unwrap();
    }
    file
}

#[tokio::test]
#[ignore]
async fn csv_round_trip_increases_count_by_k() {
    let analytics = test_analytics();
    analytics.ensure_schema().await.unwrap();
    let executor = SearchExecutor::new(analytics.clone());

    let before = {
        // Bypass the 60s cache by counting through a fresh executor.
        SearchExecutor::new(analytics.clone()).total_records().await.unwrap()
    };

    let file = fixture_csv(2_500);
    let mut options = CsvIngestOptions::new(file.path());
    options.batch_size = 1_000;
    let report = ingest_csv(&analytics, &options, |_| {}).await.unwrap();
    assert_eq!(report.total_rows, 2_500);
    assert_eq!(report.processed_rows, 2_500);
    assert_eq!(report.error_rows, 0);

    let after = SearchExecutor::new(analytics).total_records().await.unwrap();
    assert_eq!(after, before + 2_500);
    drop(executor);
}

#[tokio::test]
#[ignore]
async fn repeated_search_is_deterministic() {
    let analytics = test_analytics();
    analytics.ensure_schema().await.unwrap();
    let executor = SearchExecutor::new(analytics);

    let request = SearchRequest {
        query: "singh".into(),
        ..SearchRequest::default()
    };
    let predicate = build_predicate(&request).unwrap();
    let limit = effective_limit(50).unwrap();

    let first = executor.run(&predicate, limit, 0).await.unwrap();
    let second = executor.run(&predicate, limit, 0).await.unwrap();
    assert_eq!(first.total_count, second.total_count);
    assert_eq!(
        first.results.iter().map(|p| p.id).collect::<Vec<_>>(),
        second.results.iter().map(|p| p.id).collect::<Vec<_>>()
    );
    assert_eq!(
        first.has_more(0),
        50 < first.total_count,
    );
}

#[tokio::test]
#[ignore]
async fn adjacent_pages_do_not_overlap() {
    let analytics = test_analytics();
    analytics.ensure_schema().await.unwrap();
    let executor = SearchExecutor::new(analytics);

    let request = SearchRequest {
        query: "singh".into(),
        ..SearchRequest::default()
    };
    let predicate = build_predicate(&request).unwrap();

    let page1 = executor.run(&predicate, 100, 0).await.unwrap();
    let page2 = executor.run(&predicate, 100, 100).await.unwrap();
    assert_eq!(page1.total_count, page2.total_count);

    let ids1: std::collections::HashSet<_> = page1.results.iter().map(|p| p.id).collect();
    assert!(page2.results.iter().all(|p| !ids1.contains(&p.id)));
}

#[tokio::test]
#[ignore]
async fn enhanced_mobile_partitions_direct_and_fanout() {
    let analytics = test_analytics();
    analytics.ensure_schema().await.unwrap();
    let executor = SearchExecutor::new(analytics);

    let number = "9876500001";
    let page = executor.enhanced_mobile(number, 1_000, 0).await.unwrap();

    for person in &page.direct_matches {
        assert!(person.mobile == number || person.alt == number);
    }
    for person in &page.master_id_matches {
        // Fan-out rows share a master_id but are not themselves direct hits.
        assert!(person.mobile != number && person.alt != number);
        assert!(page.master_ids.contains(&person.master_id));
    }
}
