// crates/db/src/migrations.rs
/// Inline SQL migrations for the operational store schema.
///
/// Simple ordered statements rather than sqlx migration files; the schema is
/// small and self-contained. Each entry runs once, tracked by `_migrations`.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: users
    r#"
CREATE TABLE IF NOT EXISTS users (
    id                   UUID PRIMARY KEY,
    name                 TEXT NOT NULL,
    email                TEXT NOT NULL UNIQUE,
    password_hash        TEXT NOT NULL,
    user_type            TEXT NOT NULL DEFAULT 'PERMANENT',
    role                 TEXT NOT NULL DEFAULT 'USER',
    expires_at           TIMESTAMPTZ,
    is_active            BOOLEAN NOT NULL DEFAULT TRUE,
    max_searches_per_day INTEGER NOT NULL DEFAULT 500,
    max_exports_per_day  INTEGER NOT NULL DEFAULT 3,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at           TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#,
    // Migration 2: sessions
    r#"
CREATE TABLE IF NOT EXISTS user_sessions (
    id                 UUID PRIMARY KEY,
    user_id            UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    session_token_hash TEXT NOT NULL UNIQUE,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at         TIMESTAMPTZ NOT NULL,
    is_active          BOOLEAN NOT NULL DEFAULT TRUE,
    ip_address         TEXT,
    user_agent         TEXT,
    logged_out_at      TIMESTAMPTZ
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_user_sessions_user ON user_sessions(user_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_user_sessions_expires ON user_sessions(expires_at);"#,
    // Migration 3: login audit
    r#"
CREATE TABLE IF NOT EXISTS logins (
    id           UUID PRIMARY KEY,
    user_id      UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    ip_address   TEXT,
    user_agent   TEXT,
    logged_in_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#,
    // Migration 4: search audit. search_query holds the canonical structured
    // request (JSONB), never raw SQL; it backs search-within and stats.
    r#"
CREATE TABLE IF NOT EXISTS searches (
    id                UUID PRIMARY KEY,
    user_id           UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    search_query      JSONB NOT NULL,
    fingerprint       TEXT NOT NULL,
    search_time       TIMESTAMPTZ NOT NULL DEFAULT now(),
    result_count      BIGINT NOT NULL DEFAULT 0,
    execution_time_ms BIGINT NOT NULL DEFAULT 0,
    status            TEXT NOT NULL DEFAULT 'ok'
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_searches_user_time ON searches(user_id, search_time DESC);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_searches_time ON searches(search_time DESC);"#,
    // Migration 5: export audit
    r#"
CREATE TABLE IF NOT EXISTS exports (
    id          UUID PRIMARY KEY,
    user_id     UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    search_id   UUID,
    row_count   BIGINT NOT NULL DEFAULT 0,
    exported_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#,
    // Migration 6: per-day counters. date is the day in the reset time zone.
    r#"
CREATE TABLE IF NOT EXISTS daily_usage (
    user_id      UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    date         DATE NOT NULL,
    search_count INTEGER NOT NULL DEFAULT 0,
    export_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, date)
);
"#,
    // Migration 7: registration moderation
    r#"
CREATE TABLE IF NOT EXISTS user_registration_requests (
    id                 UUID PRIMARY KEY,
    name               TEXT NOT NULL,
    email              TEXT NOT NULL UNIQUE,
    phone              TEXT NOT NULL DEFAULT '',
    requested_searches INTEGER NOT NULL DEFAULT 500,
    status             TEXT NOT NULL DEFAULT 'PENDING',
    admin_notes        TEXT,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    reviewed_at        TIMESTAMPTZ,
    reviewed_by        UUID
);
"#,
    // Migration 8: password-change moderation
    r#"
CREATE TABLE IF NOT EXISTS user_password_change_requests (
    id          UUID PRIMARY KEY,
    user_id     UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    user_name   TEXT NOT NULL,
    user_email  TEXT NOT NULL,
    reason      TEXT NOT NULL DEFAULT '',
    status      TEXT NOT NULL DEFAULT 'PENDING',
    admin_notes TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    reviewed_at TIMESTAMPTZ,
    reviewed_by UUID
);
"#,
    // Migration 9: service-side event log (scheduler runs, ingest jobs)
    r#"
CREATE TABLE IF NOT EXISTS system_logs (
    id        BIGSERIAL PRIMARY KEY,
    level     TEXT NOT NULL,
    component TEXT NOT NULL,
    message   TEXT NOT NULL,
    context   JSONB,
    logged_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_nonempty() {
        assert!(!MIGRATIONS.is_empty());
        for m in MIGRATIONS {
            assert!(!m.trim().is_empty());
        }
    }

    #[test]
    fn all_spec_tables_present() {
        let all = MIGRATIONS.concat();
        for table in [
            "users",
            "user_sessions",
            "logins",
            "searches",
            "exports",
            "daily_usage",
            "user_registration_requests",
            "user_password_change_requests",
            "system_logs",
        ] {
            assert!(
                all.contains(&format!("CREATE TABLE IF NOT EXISTS {} ", table))
                    || all.contains(&format!("CREATE TABLE IF NOT EXISTS {}\n", table)),
                "missing table {table}"
            );
        }
    }
}
