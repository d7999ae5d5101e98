// crates/server/src/scheduler.rs
//! Background scheduler: the daily quota reset at the configured wall-clock
//! time in the reset zone, and the weekly purge of stale sessions.
//!
//! Transient DB errors are retried with exponential back-off capped at 30 s;
//! the window is never skipped. Jobs run on their own deadlines, independent
//! of HTTP request timeouts.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use finone_db::Database;
use serde_json::json;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Longest pause between retries of a failed job run.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Sessions expired or logged out longer than this ago get purged.
const SESSION_RETENTION: ChronoDuration = ChronoDuration::days(7);

const WEEKLY: Duration = Duration::from_secs(7 * 24 * 3600);

/// The next instant the daily reset fires: the first `hour:minute`
/// wall-clock occurrence in `tz` strictly after `after`.
pub fn next_reset_time(after: DateTime<Utc>, tz: Tz, hour: u32, minute: u32) -> DateTime<Utc> {
    let mut date = after.with_timezone(&tz).date_naive();
    loop {
        let candidate = date
            .and_hms_opt(hour, minute, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest());
        match candidate {
            // `earliest` is None inside a DST gap; fall through to the next day.
            Some(at) if at > after => return at.with_timezone(&Utc),
            _ => date = date.succ_opt().expect("date in supported range"),
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    tz: Tz,
    reset_hour: u32,
    reset_minute: u32,
}

/// Handles on the spawned background loops; aborted on shutdown after the
/// HTTP listener drains.
pub struct SchedulerHandle {
    daily: JoinHandle<()>,
    weekly: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn shutdown(self) {
        self.daily.abort();
        self.weekly.abort();
    }
}

impl Scheduler {
    pub fn new(db: Database, tz: Tz, reset_time: (u32, u32)) -> Self {
        Self {
            db,
            tz,
            reset_hour: reset_time.0,
            reset_minute: reset_time.1,
        }
    }

    /// The next scheduled reset instant, from now.
    pub fn next_reset(&self) -> DateTime<Utc> {
        next_reset_time(Utc::now(), self.tz, self.reset_hour, self.reset_minute)
    }

    /// Spawn both loops.
    pub fn spawn(self) -> SchedulerHandle {
        let daily = tokio::spawn(self.clone().daily_loop());
        let weekly = tokio::spawn(self.weekly_loop());
        SchedulerHandle { daily, weekly }
    }

    async fn daily_loop(self) {
        // Catch-up: if the next occurrence is more than a day out (a reset
        // window was missed while down), run immediately for today.
        let next = self.next_reset();
        if next - Utc::now() > ChronoDuration::hours(24) {
            let today = Utc::now().with_timezone(&self.tz).date_naive();
            info!(%next, "Next reset over 24h away; running catch-up reset");
            self.run_daily_reset(today).await;
        }

        loop {
            let next = self.next_reset();
            let wait = (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::from_secs(0));
            info!(fire_at = %next, "Daily reset scheduled");
            tokio::time::sleep(wait).await;

            // The reset applies to the local date the window fired in.
            let date = next.with_timezone(&self.tz).date_naive();
            self.run_daily_reset(date).await;
        }
    }

    /// Reset all counters for `date`, retrying until it sticks.
    async fn run_daily_reset(&self, date: NaiveDate) {
        let mut backoff = Duration::from_secs(1);
        loop {
            match self.db.reset_all_usage(date).await {
                Ok(rows) => {
                    info!(%date, rows, "Daily usage reset complete");
                    let context = json!({ "date": date.to_string(), "rows": rows });
                    if let Err(e) = self
                        .db
                        .insert_system_log("info", "scheduler", "daily usage reset", Some(context))
                        .await
                    {
                        warn!(error = %e, "Failed to record reset in system log");
                    }
                    return;
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?backoff, "Daily reset failed; retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn weekly_loop(self) {
        let mut interval = tokio::time::interval(WEEKLY);
        loop {
            interval.tick().await;
            let cutoff = Utc::now() - SESSION_RETENTION;
            let mut backoff = Duration::from_secs(1);
            loop {
                match self.db.purge_stale_sessions(cutoff).await {
                    Ok(purged) => {
                        info!(purged, %cutoff, "Weekly session cleanup complete");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, retry_in = ?backoff, "Session cleanup failed; retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Asia::Kolkata;

    #[test]
    fn next_reset_is_midnight_local() {
        let after = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        let next = next_reset_time(after, Kolkata, 0, 0);
        let local = next.with_timezone(&Kolkata);
        assert_eq!((local.hour(), local.minute(), local.second()), (0, 0, 0));
        assert!(next > after);
        // Midnight IST on the 15th is 18:30 UTC on the 14th.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 14, 18, 30, 0).unwrap());
    }

    #[test]
    fn next_reset_is_strictly_in_the_future() {
        // Exactly at the reset instant, the next fire is tomorrow.
        let at_reset = Kolkata
            .with_ymd_and_hms(2026, 6, 1, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let next = next_reset_time(at_reset, Kolkata, 0, 0);
        assert_eq!(next - at_reset, ChronoDuration::hours(24));
    }

    #[test]
    fn next_reset_never_more_than_a_day_out() {
        let now = Utc::now();
        let next = next_reset_time(now, Kolkata, 0, 0);
        assert!(next > now);
        assert!(next - now <= ChronoDuration::hours(24));
    }

    #[test]
    fn configured_wall_clock_time_is_honored() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_reset_time(after, Kolkata, 4, 30);
        let local = next.with_timezone(&Kolkata);
        assert_eq!((local.hour(), local.minute()), (4, 30));
    }
}
