//! Explicit request context and clock

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use collectives_shared::ClubSettings;

use crate::catalog::{Capabilities, Caller};
use crate::error::DomainError;

/// Wall clock in the club's timezone
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Manually driven clock for tests and replays
#[cfg(any(test, feature = "test-utils"))]
pub struct FixedClock {
    now: std::sync::Mutex<NaiveDateTime>,
}

#[cfg(any(test, feature = "test-utils"))]
impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: std::sync::Mutex::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.lock().map(|guard| *guard).unwrap_or_default()
    }
}

/// Everything a core entry point needs to know about the request: who calls,
/// when, and under which club settings.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Caller,
    pub now: NaiveDateTime,
    pub settings: Arc<ClubSettings>,
}

impl RequestContext {
    pub fn new(caller: Caller, now: NaiveDateTime, settings: Arc<ClubSettings>) -> Self {
        Self { caller, now, settings }
    }

    pub fn anonymous(now: NaiveDateTime, settings: Arc<ClubSettings>) -> Self {
        Self::new(Caller::Anonymous, now, settings)
    }

    pub fn member(caps: Capabilities, now: NaiveDateTime, settings: Arc<ClubSettings>) -> Self {
        Self::new(Caller::Member(caps), now, settings)
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    pub fn require_member(&self) -> Result<&Capabilities, DomainError> {
        self.caller.require_member()
    }
}
