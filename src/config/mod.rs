//! Environment-driven configuration.

pub mod rate_limits;

pub use rate_limits::{
    CategoryLimits, MESSAGES_CATEGORY, PROFILES_CATEGORY, SEARCH_CATEGORY, SpacingPolicy,
    builtin_categories,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Read an optional environment variable, treating empty values as
/// unset.
pub(crate) fn optional_env(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the persisted quota records.
    pub data_dir: PathBuf,
    /// Rate-limit categories known to the limiter.
    pub categories: Vec<CategoryLimits>,
}

impl Config {
    /// Resolve from environment variables on top of the builtin
    /// defaults.
    ///
    /// Recognized variables: `TOOLGATE_DATA_DIR`, and per category
    /// `TOOLGATE_<CATEGORY>_DAILY_LIMIT`,
    /// `TOOLGATE_<CATEGORY>_MIN_DELAY_SECS`,
    /// `TOOLGATE_<CATEGORY>_MAX_DELAY_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = optional_env("TOOLGATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let mut categories = builtin_categories();
        for cat in &mut categories {
            apply_env_overrides(cat)?;
        }

        Ok(Self {
            data_dir,
            categories,
        })
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("toolgate")
        .join("rate_limits")
}

fn apply_env_overrides(cat: &mut CategoryLimits) -> Result<(), ConfigError> {
    let upper = cat.key.to_ascii_uppercase();

    if let Some(raw) = optional_env(&format!("TOOLGATE_{upper}_DAILY_LIMIT")) {
        cat.daily_limit = parse_env(&format!("TOOLGATE_{upper}_DAILY_LIMIT"), &raw)?;
    }
    if let Some(raw) = optional_env(&format!("TOOLGATE_{upper}_MIN_DELAY_SECS")) {
        cat.min_delay_secs = parse_env(&format!("TOOLGATE_{upper}_MIN_DELAY_SECS"), &raw)?;
    }
    if let Some(raw) = optional_env(&format!("TOOLGATE_{upper}_MAX_DELAY_SECS")) {
        cat.max_delay_secs = parse_env(&format!("TOOLGATE_{upper}_MAX_DELAY_SECS"), &raw)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("must be a number: {e}"),
    })
}
