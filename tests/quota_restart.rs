//! Quota persistence across simulated process restarts.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;

use toolgate::config::CategoryLimits;
use toolgate::quota::{AdmitResult, QuotaRecord, QuotaStore, RateLimiter, RetryAfter};
use toolgate::testing::{FixedJitter, ManualClock};

fn limiter(dir: &std::path::Path, clock: Arc<ManualClock>, daily_limit: u32) -> RateLimiter {
    RateLimiter::with_parts(
        QuotaStore::new(dir),
        vec![CategoryLimits::new("search", 0.0, 0.0, daily_limit)],
        clock,
        Arc::new(FixedJitter(0.0)),
    )
    .expect("valid category")
}

#[test]
fn record_round_trips_through_a_fresh_store() {
    let dir = tempfile::tempdir().expect("temp dir");
    let today = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    let record = QuotaRecord {
        category: "search".to_string(),
        day: today,
        count: 17,
        last_action_at: Some(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 30).unwrap()),
    };
    QuotaStore::new(dir.path()).save(&record).expect("save");

    // A brand-new store over the same directory stands in for a fresh
    // process inheriting state from the previous run.
    let loaded = QuotaStore::new(dir.path()).load("search", today);
    assert_eq!(loaded, record);
}

#[tokio::test]
async fn consumption_carries_across_limiter_instances() {
    let dir = tempfile::tempdir().expect("temp dir");
    let clock = Arc::new(ManualClock::new());

    {
        let first = limiter(dir.path(), clock.clone(), 3);
        for _ in 0..3 {
            assert!(matches!(
                first.admit("search").await,
                AdmitResult::Allowed { .. }
            ));
            clock.advance(Duration::from_secs(1));
        }
    }

    // The replacement limiter starts from the persisted count, so the
    // daily quota stays spent.
    let second = limiter(dir.path(), clock.clone(), 3);
    assert_eq!(second.status("search").unwrap().count_today, 3);
    assert_eq!(
        second.admit("search").await,
        AdmitResult::Denied {
            retry_after: RetryAfter::Tomorrow
        }
    );

    // Until the day rolls over.
    clock.advance_days(1);
    assert!(matches!(
        second.admit("search").await,
        AdmitResult::Allowed { .. }
    ));
}

#[tokio::test]
async fn spacing_survives_a_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let clock = Arc::new(ManualClock::new());

    {
        let first = RateLimiter::with_parts(
            QuotaStore::new(dir.path()),
            vec![CategoryLimits::new("search", 30.0, 30.0, 100)],
            clock.clone(),
            Arc::new(FixedJitter(30.0)),
        )
        .expect("valid category");
        assert_eq!(
            first.admit("search").await,
            AdmitResult::Allowed {
                wait: Duration::ZERO
            }
        );
    }

    // Ten seconds later in a new process: twenty seconds still to go.
    clock.advance(Duration::from_secs(10));
    let second = RateLimiter::with_parts(
        QuotaStore::new(dir.path()),
        vec![CategoryLimits::new("search", 30.0, 30.0, 100)],
        clock,
        Arc::new(FixedJitter(30.0)),
    )
    .expect("valid category");
    assert_eq!(
        second.admit("search").await,
        AdmitResult::Allowed {
            wait: Duration::from_secs(20)
        }
    );
}

#[test]
fn corrupt_record_resets_but_keeps_the_tool_available() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join("search.json"), b"\x00\x01garbage").expect("write");

    let today = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let record = QuotaStore::new(dir.path()).load("search", today);
    assert_eq!(record.count, 0);
    assert_eq!(record.day, today);
}
