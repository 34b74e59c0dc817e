//! Configuration management

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::*;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub club: ClubSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub oracle: OracleSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,
}

/// Club policy knobs consumed by the registration core.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClubSettings {
    /// Anonymous callers do not see events that ended more than this many days ago.
    pub max_history_for_anonymous_days: i64,
    /// Number of valid warnings from which each further warning carries a suspension.
    pub suspension_threshold: u32,
    pub federation_year_start_month: u32,
    pub federation_year_end_month: u32,
    /// Offset of the club's wall clock from UTC.
    pub utc_offset_hours: i32,
    pub oracle_timeout_ms: u64,
    pub payment_timeout_minutes: i64,
}

impl Default for ClubSettings {
    fn default() -> Self {
        Self {
            max_history_for_anonymous_days: DEFAULT_MAX_HISTORY_FOR_ANONYMOUS_DAYS,
            suspension_threshold: DEFAULT_SUSPENSION_THRESHOLD,
            federation_year_start_month: DEFAULT_FEDERATION_YEAR_START_MONTH,
            federation_year_end_month: DEFAULT_FEDERATION_YEAR_END_MONTH,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            oracle_timeout_ms: DEFAULT_ORACLE_TIMEOUT_MS,
            payment_timeout_minutes: DEFAULT_PAYMENT_TIMEOUT_MINUTES,
        }
    }
}

impl ClubSettings {
    /// Rejects values the core cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=12).contains(&self.federation_year_start_month)
            || !(1..=12).contains(&self.federation_year_end_month)
        {
            return Err("federation year months must be within 1..=12".into());
        }
        if self.federation_year_end_month % 12 + 1 != self.federation_year_start_month {
            return Err("federation year must end the month before it starts".into());
        }
        if self.suspension_threshold == 0 {
            return Err("suspension_threshold must be at least 1".into());
        }
        if self.max_history_for_anonymous_days < 0 {
            return Err("max_history_for_anonymous_days must not be negative".into());
        }
        if !(-14..=14).contains(&self.utc_offset_hours) {
            return Err("utc_offset_hours must be within -14..=14".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitSettings {
    pub registrations_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { registrations_per_minute: DEFAULT_REGISTRATIONS_PER_MINUTE }
    }
}

/// Federation membership registry. Without a base URL every license lookup
/// is reported unavailable.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OracleSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let config = Config::builder()
            .set_default("app.env", "development")?
            .set_default("app.host", "127.0.0.1")?
            .set_default("app.port", 8080)?
            .set_default("app.name", "collectives-server")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 3)?
            .set_default("jwt.access_token_expiry", DEFAULT_ACCESS_TOKEN_EXPIRY)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::default().separator("__").try_parsing(true))
            .build()?;
        let config: AppConfig = config.try_deserialize()?;
        config.club.validate().map_err(ConfigError::Message)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_club_defaults() {
        let club = ClubSettings::default();
        assert_eq!(club.max_history_for_anonymous_days, 30);
        assert_eq!(club.suspension_threshold, 3);
        assert_eq!(club.federation_year_start_month, 10);
        assert_eq!(club.federation_year_end_month, 9);
        assert!(club.validate().is_ok());
    }

    #[test]
    fn test_club_validation_rejects_bad_month() {
        let club = ClubSettings { federation_year_end_month: 13, ..ClubSettings::default() };
        assert!(club.validate().is_err());
    }

    #[test]
    fn test_club_validation_rejects_gap_between_years() {
        let club = ClubSettings { federation_year_start_month: 1, ..ClubSettings::default() };
        assert!(club.validate().is_err());
        let calendar = ClubSettings {
            federation_year_start_month: 1,
            federation_year_end_month: 12,
            ..ClubSettings::default()
        };
        assert!(calendar.validate().is_ok());
    }

    #[test]
    fn test_club_section_deserializes_partially() {
        let club: ClubSettings = Config::builder()
            .set_override("suspension_threshold", 5)
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .unwrap();
        assert_eq!(club.suspension_threshold, 5);
        assert_eq!(club.max_history_for_anonymous_days, 30);
    }
}
