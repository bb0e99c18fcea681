//! Per-category rate limit settings.

use crate::error::ConfigError;

/// Category key for profile lookups.
pub const PROFILES_CATEGORY: &str = "profiles";
/// Category key for people searches.
pub const SEARCH_CATEGORY: &str = "search";
/// Category key for outbound messages.
pub const MESSAGES_CATEGORY: &str = "messages";

/// What to do when a call arrives before the spacing requirement is
/// met: hold the caller for the remainder, or deny immediately so a
/// bulk caller can back off on its own schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingPolicy {
    Wait,
    Deny,
}

/// Limit settings for one operation category.
#[derive(Debug, Clone)]
pub struct CategoryLimits {
    /// Category key, also the persisted record's file stem.
    pub key: String,
    /// Minimum spacing between consecutive operations, seconds.
    pub min_delay_secs: f64,
    /// Maximum spacing (jitter upper bound), seconds.
    pub max_delay_secs: f64,
    /// Operations permitted per local calendar day.
    pub daily_limit: u32,
    /// Behavior when spacing is not yet met.
    pub policy: SpacingPolicy,
    /// Hold off operations between 00:30 and 07:30 local time.
    pub night_pause: bool,
}

impl CategoryLimits {
    pub fn new(key: impl Into<String>, min_delay_secs: f64, max_delay_secs: f64, daily_limit: u32) -> Self {
        Self {
            key: key.into(),
            min_delay_secs,
            max_delay_secs,
            daily_limit,
            policy: SpacingPolicy::Wait,
            night_pause: false,
        }
    }

    pub fn with_policy(mut self, policy: SpacingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_night_pause(mut self, enabled: bool) -> Self {
        self.night_pause = enabled;
        self
    }

    /// Invariants: `min <= max`, `daily_limit > 0`.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay_secs < 0.0 || self.max_delay_secs < self.min_delay_secs {
            return Err(ConfigError::InvalidCategory {
                key: self.key.clone(),
                reason: format!(
                    "delay range ({}, {}) must satisfy 0 <= min <= max",
                    self.min_delay_secs, self.max_delay_secs
                ),
            });
        }
        if self.daily_limit == 0 {
            return Err(ConfigError::InvalidCategory {
                key: self.key.clone(),
                reason: "daily_limit must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Conservative defaults for the builtin network toolset. The wrapped
/// service restricts accounts that exceed its unofficial ceilings, so
/// these stay well below them.
pub fn builtin_categories() -> Vec<CategoryLimits> {
    vec![
        CategoryLimits::new(PROFILES_CATEGORY, 10.0, 30.0, 500),
        CategoryLimits::new(SEARCH_CATEGORY, 30.0, 60.0, 100),
        CategoryLimits::new(MESSAGES_CATEGORY, 60.0, 180.0, 100),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_categories_are_valid() {
        for cat in builtin_categories() {
            cat.validate().unwrap();
        }
    }

    #[test]
    fn inverted_delay_range_is_rejected() {
        let cat = CategoryLimits::new("bad", 30.0, 10.0, 100);
        assert!(cat.validate().is_err());
    }

    #[test]
    fn zero_daily_limit_is_rejected() {
        let cat = CategoryLimits::new("bad", 1.0, 2.0, 0);
        assert!(cat.validate().is_err());
    }
}
