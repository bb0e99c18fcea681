//! Test harness: deterministic clock and jitter sources, plus a stub
//! network client with canned responses and call counting.
//!
//! Used by the unit tests in this crate and by the integration tests
//! under `tests/`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::{Value, json};

use crate::quota::{Clock, Jitter};
use crate::tools::builtin::network::{ClientError, NetworkClient, ProfileId};

/// Deterministic clock. Time only moves when a test calls
/// [`advance`](Self::advance) or [`advance_days`](Self::advance_days);
/// the local time of day is set independently for night-pause tests.
pub struct ManualClock {
    state: Mutex<ManualState>,
}

struct ManualState {
    now: DateTime<Utc>,
    today: NaiveDate,
    time_of_day: NaiveTime,
}

impl ManualClock {
    /// Start at a fixed mid-day instant.
    pub fn new() -> Self {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Self {
            state: Mutex::new(ManualState {
                now,
                today: now.date_naive(),
                time_of_day: now.time(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().expect("clock lock poisoned")
    }

    /// Move the instant forward without crossing a day boundary.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now += chrono::Duration::from_std(by).expect("advance fits in a chrono duration");
    }

    /// Cross `days` local day boundaries.
    pub fn advance_days(&self, days: u64) {
        let mut state = self.lock();
        state.now += chrono::Duration::days(days as i64);
        state.today = state.now.date_naive();
    }

    /// Set the local time of day reported to night-pause checks.
    pub fn set_time_of_day(&self, time: NaiveTime) {
        self.lock().time_of_day = time;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn today(&self) -> NaiveDate {
        self.lock().today
    }

    fn time_of_day(&self) -> NaiveTime {
        self.lock().time_of_day
    }
}

/// Jitter source returning a fixed spacing regardless of the range.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn draw(&self, _min: f64, _max: f64) -> f64 {
        self.0
    }
}

/// Network client stub with canned responses and call counters.
pub struct StubNetworkClient {
    profile_calls: AtomicU32,
    search_calls: AtomicU32,
    sent_messages: AtomicU32,
}

impl StubNetworkClient {
    pub fn new() -> Self {
        Self {
            profile_calls: AtomicU32::new(0),
            search_calls: AtomicU32::new(0),
            sent_messages: AtomicU32::new(0),
        }
    }

    /// Number of profile/contact lookups performed.
    pub fn profile_calls(&self) -> u32 {
        self.profile_calls.load(Ordering::Relaxed)
    }

    /// Number of searches performed.
    pub fn search_calls(&self) -> u32 {
        self.search_calls.load(Ordering::Relaxed)
    }

    /// Number of messages and replies sent.
    pub fn sent_messages(&self) -> u32 {
        self.sent_messages.load(Ordering::Relaxed)
    }
}

impl Default for StubNetworkClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkClient for StubNetworkClient {
    async fn profile(&self, _id: &ProfileId) -> Result<Value, ClientError> {
        self.profile_calls.fetch_add(1, Ordering::Relaxed);
        Ok(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "headline": "Analytical Engine Programmer",
            "publicIdentifier": "ada-lovelace",
            "entityUrn": "urn:li:fs_profile:AC0DE",
            "locationName": "London",
            "experience": [{"title": "Programmer", "companyName": "Analytical Engine"}]
        }))
    }

    async fn own_profile(&self) -> Result<Value, ClientError> {
        self.profile(&ProfileId::Public("me".to_string())).await
    }

    async fn contact_info(&self, _id: &ProfileId) -> Result<Value, ClientError> {
        self.profile_calls.fetch_add(1, Ordering::Relaxed);
        Ok(json!({ "email_address": "ada@example.com", "websites": [] }))
    }

    async fn search_people(
        &self,
        keywords: &str,
        _network_depth: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Value>, ClientError> {
        self.search_calls.fetch_add(1, Ordering::Relaxed);
        Ok((0..limit.min(3))
            .map(|i| {
                json!({
                    "firstName": "Match",
                    "lastName": format!("{i}"),
                    "headline": format!("Result for '{keywords}'"),
                    "entityUrn": format!("urn:li:fs_profile:M{i}"),
                })
            })
            .collect())
    }

    async fn connections(&self, limit: usize) -> Result<Vec<Value>, ClientError> {
        self.search_people("connections", None, limit).await
    }

    async fn conversations(&self) -> Result<Vec<Value>, ClientError> {
        Ok(vec![json!({
            "conversation_id": "conv-1",
            "participants": ["Ada Lovelace"],
            "unread": 0,
        })])
    }

    async fn conversation(&self, conversation_id: &str) -> Result<Value, ClientError> {
        Ok(json!({
            "conversation_id": conversation_id,
            "messages": [{"from": "Ada Lovelace", "body": "The engine weaves algebraic patterns."}],
        }))
    }

    async fn send_message(&self, _recipient_urn: &str, _body: &str) -> Result<(), ClientError> {
        self.sent_messages.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn reply(&self, _conversation_id: &str, _body: &str) -> Result<(), ClientError> {
        self.sent_messages.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_deterministically() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(90));
        assert_eq!((clock.now() - start).num_seconds(), 90);
        // Advancing the instant does not move the day.
        assert_eq!(clock.today(), start.date_naive());

        clock.advance_days(1);
        assert_eq!(clock.today(), start.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn fixed_jitter_ignores_the_range() {
        assert_eq!(FixedJitter(7.5).draw(0.0, 100.0), 7.5);
    }

    #[tokio::test]
    async fn stub_client_counts_calls() {
        let client = StubNetworkClient::new();
        client
            .profile(&ProfileId::Public("ada".to_string()))
            .await
            .unwrap();
        client.send_message("AC0DE", "hi").await.unwrap();
        assert_eq!(client.profile_calls(), 1);
        assert_eq!(client.sent_messages(), 1);
    }
}
