use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

use super::deserialize_optional_nullable;
use super::order::{EXPIRATION_DAYS_MAX, EXPIRATION_DAYS_MIN};

/// Row keys in the `settings` table.
pub const SETTING_DEFAULT_EXPIRATION_DAYS: &str = "default_expiration_days";
pub const SETTING_DEFAULT_ONE_TIME_USE: &str = "default_one_time_use";

/// Global defaults, consulted only when an order is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    /// None = new orders never expire.
    pub default_expiration_days: Option<i32>,
    pub default_one_time_use: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            default_expiration_days: Some(30),
            default_one_time_use: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettings {
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub default_expiration_days: Option<Option<i32>>,
    #[serde(default)]
    pub default_one_time_use: Option<bool>,
}

impl UpdateSettings {
    pub fn validate(&self) -> Result<()> {
        if let Some(Some(days)) = self.default_expiration_days
            && !(EXPIRATION_DAYS_MIN..=EXPIRATION_DAYS_MAX).contains(&days)
        {
            return Err(AppError::BadRequest(msg::EXPIRATION_DAYS_RANGE.into()));
        }
        Ok(())
    }

    /// Settings after applying this update on top of `current`.
    pub fn apply(&self, current: PolicySettings) -> PolicySettings {
        PolicySettings {
            default_expiration_days: self
                .default_expiration_days
                .unwrap_or(current.default_expiration_days),
            default_one_time_use: self
                .default_one_time_use
                .unwrap_or(current.default_one_time_use),
        }
    }
}
