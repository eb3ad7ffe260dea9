use std::env;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub bootstrap_admin_username: Option<String>,
    pub dev_mode: bool,
    pub audit_log_enabled: bool,
    /// Whether turning a multi-use order into a one-time order zeroes its
    /// claim count. Admin edits can override this per request.
    pub reset_claims_on_one_time_flip: bool,
    pub rate_limit: RateLimitConfig,
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("CLAIMDROP_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let defaults = RateLimitConfig::default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "claimdrop.db".to_string()),
            bootstrap_admin_username: env::var("BOOTSTRAP_ADMIN_USERNAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            dev_mode,
            audit_log_enabled: env_bool("AUDIT_LOG_ENABLED", true),
            reset_claims_on_one_time_flip: env_bool("RESET_CLAIMS_ON_ONE_TIME_FLIP", true),
            rate_limit: RateLimitConfig {
                claim_rpm: env_u32("RATE_LIMIT_CLAIM_RPM", defaults.claim_rpm),
                admin_rpm: env_u32("RATE_LIMIT_ADMIN_RPM", defaults.admin_rpm),
                relaxed_rpm: env_u32("RATE_LIMIT_RELAXED_RPM", defaults.relaxed_rpm),
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
