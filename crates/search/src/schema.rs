// crates/search/src/schema.rs
//! ClickHouse schema for the analytic store.
//!
//! One append-only `people` table ordered by `(mobile, name, master_id)` —
//! the same key the executor sorts pages by, so pagination is deterministic
//! under concurrent appends. Skipping indexes accelerate the predicate
//! shapes the builder emits: n-gram Bloom for substring matches on the
//! free-text columns, token Bloom for the identifier-ish columns, and an
//! exact Bloom for the materialized pincode.
//!
//! Every statement is idempotent (`IF NOT EXISTS`), safe to run on every
//! startup.

/// DDL for the given database name, in execution order.
pub fn ddl(database: &str) -> Vec<String> {
    vec![
        format!("CREATE DATABASE IF NOT EXISTS {database}"),
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {database}.people
(
    id         UUID,
    master_id  String,
    mobile     String,
    name       String,
    fname      String,
    address    String,
    alt        String,
    circle     String,
    email      String,
    pincode    String,
    created_at DateTime64(3, 'UTC'),
    updated_at DateTime64(3, 'UTC'),
    INDEX idx_people_name    name    TYPE ngrambf_v1(3, 10000, 3, 7) GRANULARITY 4,
    INDEX idx_people_fname   fname   TYPE ngrambf_v1(3, 10000, 3, 7) GRANULARITY 4,
    INDEX idx_people_address address TYPE ngrambf_v1(3, 10000, 3, 7) GRANULARITY 4,
    INDEX idx_people_email     email     TYPE tokenbf_v1(8192, 3, 7) GRANULARITY 4,
    INDEX idx_people_circle    circle    TYPE tokenbf_v1(8192, 3, 7) GRANULARITY 4,
    INDEX idx_people_mobile    mobile    TYPE tokenbf_v1(8192, 3, 7) GRANULARITY 4,
    INDEX idx_people_alt       alt       TYPE tokenbf_v1(8192, 3, 7) GRANULARITY 4,
    INDEX idx_people_master_id master_id TYPE tokenbf_v1(8192, 3, 7) GRANULARITY 4,
    INDEX idx_people_pincode   pincode   TYPE bloom_filter(0.01) GRANULARITY 4
)
ENGINE = MergeTree
ORDER BY (mobile, name, master_id)
SETTINGS index_granularity = 8192
"#
        ),
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {database}.search_performance
(
    search_id         UUID,
    user_id           UUID,
    fingerprint       String,
    result_count      UInt64,
    execution_time_ms UInt64,
    recorded_at       DateTime64(3, 'UTC')
)
ENGINE = MergeTree
ORDER BY recorded_at
"#
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_is_idempotent_and_ordered() {
        let statements = ddl("finone");
        assert!(statements[0].starts_with("CREATE DATABASE IF NOT EXISTS"));
        for s in &statements {
            assert!(s.contains("IF NOT EXISTS"));
        }
    }

    #[test]
    fn people_table_carries_the_physical_key_and_indexes() {
        let all = ddl("finone").join("\n");
        assert!(all.contains("ORDER BY (mobile, name, master_id)"));
        assert!(all.contains("ngrambf_v1"));
        assert!(all.contains("tokenbf_v1"));
        assert!(all.contains("bloom_filter(0.01)"));
        assert!(all.contains("pincode"));
    }
}
