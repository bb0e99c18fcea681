//! Admission control over persisted per-category quotas.
//!
//! The limiter decides whether an operation in a category may proceed
//! now, what spacing delay to impose, and records the consumption
//! durably so quotas survive process restarts. The wrapped services
//! restrict accounts whose usage exceeds their ceilings, which is why
//! overshoot (a lost-update on the counter) is treated as a
//! correctness bug and admission is serialized per category.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{CategoryLimits, SpacingPolicy};
use crate::error::ConfigError;
use crate::quota::clock::{Clock, SystemClock};
use crate::quota::jitter::{Jitter, UniformJitter};
use crate::quota::store::QuotaStore;

// Night-pause window, local seconds from midnight: 00:30 to 07:30.
const NIGHT_START_SECS: u32 = 30 * 60;
const NIGHT_END_SECS: u32 = 7 * 3600 + 30 * 60;

/// When a denied caller may try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    /// Daily quota exhausted; resets at the next local midnight.
    Tomorrow,
    /// Spacing or night-pause hold; retry after this long.
    After(Duration),
}

impl fmt::Display for RetryAfter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryAfter::Tomorrow => write!(f, "tomorrow"),
            RetryAfter::After(d) => write!(f, "{}s", d.as_secs()),
        }
    }
}

impl Serialize for RetryAfter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RetryAfter::Tomorrow => serializer.serialize_str("tomorrow"),
            RetryAfter::After(d) => serializer.serialize_u64(d.as_secs()),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmitResult {
    /// The slot is reserved; proceed after sleeping `wait`.
    Allowed { wait: Duration },
    /// Quota exhausted, or spacing unmet under a deny-fast policy.
    Denied { retry_after: RetryAfter },
}

/// Read-only snapshot of one category's consumption.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub category: String,
    pub count_today: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    /// Next local midnight.
    pub resets_at: NaiveDateTime,
}

/// Per-category admission gate backed by durable quota records.
///
/// Only the load→decide→save section for a single category is
/// serialized; the imposed spacing wait is performed by the caller
/// after the category lock is released, so blocked callers never
/// starve unrelated admission checks.
pub struct RateLimiter {
    store: QuotaStore,
    categories: HashMap<String, CategoryLimits>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
}

impl RateLimiter {
    /// Build a limiter over `store` with the system clock and uniform
    /// jitter. Category invariants are checked here; a bad category is
    /// fatal at startup.
    pub fn new(store: QuotaStore, categories: Vec<CategoryLimits>) -> Result<Self, ConfigError> {
        Self::with_parts(store, categories, Arc::new(SystemClock), Arc::new(UniformJitter))
    }

    /// Build with explicit clock and jitter sources. Tests supply
    /// deterministic implementations.
    pub fn with_parts(
        store: QuotaStore,
        categories: Vec<CategoryLimits>,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn Jitter>,
    ) -> Result<Self, ConfigError> {
        let mut by_key = HashMap::new();
        for cat in categories {
            cat.validate()?;
            by_key.insert(cat.key.clone(), cat);
        }
        Ok(Self {
            store,
            categories: by_key,
            locks: Mutex::new(HashMap::new()),
            clock,
            jitter,
        })
    }

    /// Whether `key` is a configured category.
    pub fn has_category(&self, key: &str) -> bool {
        self.categories.contains_key(key)
    }

    async fn category_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Decide whether an operation in `category` may proceed now.
    ///
    /// On `Allowed` the slot is already reserved — the count is
    /// incremented and `last_action_at` set to the scheduled execution
    /// time before this returns — so two concurrent callers can never
    /// both claim the last remaining daily slot. The caller performs
    /// the returned wait itself; abandoning the wait does not return
    /// the slot.
    pub async fn admit(&self, category: &str) -> AdmitResult {
        let Some(limits) = self.categories.get(category) else {
            tracing::debug!(category, "No limits configured for category, admitting");
            return AdmitResult::Allowed {
                wait: Duration::ZERO,
            };
        };

        let lock = self.category_lock(category).await;
        let _guard = lock.lock().await;

        let today = self.clock.today();
        let now = self.clock.now();
        let mut record = self.store.load(category, today);

        if record.count >= limits.daily_limit {
            tracing::warn!(
                category,
                count = record.count,
                limit = limits.daily_limit,
                "Daily limit reached"
            );
            return AdmitResult::Denied {
                retry_after: RetryAfter::Tomorrow,
            };
        }

        if limits.night_pause
            && let Some(hold) = night_hold(self.clock.time_of_day())
        {
            tracing::info!(category, hold_secs = hold.as_secs(), "Night pause active");
            return AdmitResult::Denied {
                retry_after: RetryAfter::After(hold),
            };
        }

        let drawn = self
            .jitter
            .draw(limits.min_delay_secs, limits.max_delay_secs)
            .max(0.0);
        let required = chrono::Duration::from_std(Duration::from_secs_f64(drawn))
            .unwrap_or_else(|_| chrono::Duration::zero());

        // Spacing counts from the previous call's scheduled execution
        // time, so consecutive timestamps always sit >= min apart.
        let scheduled = match record.last_action_at {
            Some(last) => std::cmp::max(last + required, now),
            None => now,
        };
        let wait = (scheduled - now).to_std().unwrap_or(Duration::ZERO);

        if !wait.is_zero() && limits.policy == SpacingPolicy::Deny {
            return AdmitResult::Denied {
                retry_after: RetryAfter::After(wait),
            };
        }

        record.count += 1;
        record.last_action_at = Some(scheduled);
        if let Err(e) = self.store.save(&record) {
            // Availability over perfect accounting: the admission
            // stands, the lost increment is logged.
            tracing::warn!(category, error = %e, "Failed to persist quota record");
        }

        tracing::debug!(
            category,
            count = record.count,
            limit = limits.daily_limit,
            wait_secs = wait.as_secs_f64(),
            "Admitted"
        );
        AdmitResult::Allowed { wait }
    }

    /// Read-only status for one category. Never mutates stored state.
    pub fn status(&self, category: &str) -> Option<QuotaStatus> {
        let limits = self.categories.get(category)?;
        let today = self.clock.today();
        let record = self.store.load(category, today);
        Some(QuotaStatus {
            category: category.to_string(),
            count_today: record.count,
            daily_limit: limits.daily_limit,
            remaining: limits.daily_limit.saturating_sub(record.count),
            resets_at: next_midnight(today),
        })
    }

    /// Status for every configured category, sorted by key.
    pub fn status_all(&self) -> Vec<QuotaStatus> {
        let mut all: Vec<_> = self
            .categories
            .keys()
            .filter_map(|key| self.status(key))
            .collect();
        all.sort_by(|a, b| a.category.cmp(&b.category));
        all
    }
}

fn next_midnight(today: NaiveDate) -> NaiveDateTime {
    today.succ_opt().unwrap_or(today).and_time(NaiveTime::MIN)
}

fn night_hold(now: NaiveTime) -> Option<Duration> {
    let secs = now.num_seconds_from_midnight();
    if (NIGHT_START_SECS..NIGHT_END_SECS).contains(&secs) {
        Some(Duration::from_secs(u64::from(NIGHT_END_SECS - secs)))
    } else {
        None
    }
}
