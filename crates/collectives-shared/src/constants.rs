//! Application-wide constants

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 3600;

// Club policy defaults
pub const DEFAULT_MAX_HISTORY_FOR_ANONYMOUS_DAYS: i64 = 30;
pub const DEFAULT_SUSPENSION_THRESHOLD: u32 = 3;
pub const DEFAULT_FEDERATION_YEAR_START_MONTH: u32 = 10;
pub const DEFAULT_FEDERATION_YEAR_END_MONTH: u32 = 9;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 1;
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_PAYMENT_TIMEOUT_MINUTES: i64 = 30;
pub const DEFAULT_REGISTRATIONS_PER_MINUTE: u32 = 10;
