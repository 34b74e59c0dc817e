// ============================================================================
// Collectives Core - Event Entity
// File: crates/collectives-core/src/domain/event.rs
// Description: Outing scheduled by leaders, with its capacity and window
// ============================================================================

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::{ActivityType, EventType};
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Confirmed => "confirmed",
            EventStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(EventStatus::Pending),
            "confirmed" => Some(EventStatus::Confirmed),
            "cancelled" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::Pending
    }
}

/// Which callers may list an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVisibility {
    External,
    Licensed,
    Activity,
}

impl EventVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventVisibility::External => "external",
            EventVisibility::Licensed => "licensed",
            EventVisibility::Activity => "activity",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "external" => Some(EventVisibility::External),
            "licensed" => Some(EventVisibility::Licensed),
            "activity" => Some(EventVisibility::Activity),
            _ => None,
        }
    }
}

impl Default for EventVisibility {
    fn default() -> Self {
        EventVisibility::External
    }
}

/// Leader reference embedded in an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRef {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,

    pub num_slots: i32,
    pub num_online_slots: i32,
    pub num_waiting_list: i32,
    pub include_leaders_in_counts: bool,

    pub registration_open: NaiveDateTime,
    pub registration_close: NaiveDateTime,

    pub status: EventStatus,
    pub visibility: EventVisibility,
    pub requires_payment: bool,

    pub event_type: EventType,
    pub activity_types: Vec<ActivityType>,
    pub tags: Vec<String>,
    pub leaders: Vec<LeaderRef>,
    pub main_leader_id: Option<Uuid>,
}

impl Event {
    pub fn is_leader(&self, user_id: &Uuid) -> bool {
        self.leaders.iter().any(|l| &l.id == user_id)
    }

    pub fn activity_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.activity_types.iter().map(|a| a.id)
    }

    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        now >= self.start
    }

    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        now >= self.end
    }

    /// `registration_open <= now <= registration_close`
    pub fn is_registration_open_at(&self, now: NaiveDateTime) -> bool {
        self.registration_open <= now && now <= self.registration_close
    }

    /// Span checked against the member's other outings. Start and end both
    /// at the same midnight mean a full-day event.
    pub fn schedule_span(&self) -> (NaiveDateTime, NaiveDateTime) {
        if self.start == self.end && self.start.time() == NaiveTime::MIN {
            let start = self.start - Duration::seconds(1);
            (start, start + Duration::hours(18))
        } else {
            (self.start, self.end)
        }
    }

    /// Strict overlap with `[start, end]`, touching ends do not count.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && self.end > start
    }

    /// Checks every structural invariant. `can_lead(user, activity)` tells
    /// whether a leader holds EventLeader or ActivitySupervisor for an activity.
    pub fn validate_invariants(
        &self,
        can_lead: impl Fn(&Uuid, &Uuid) -> bool,
    ) -> Result<(), DomainError> {
        let fail = |msg: &str| Err(DomainError::Validation(msg.to_string()));

        if self.title.trim().is_empty() {
            return fail("title must not be empty");
        }
        if self.start > self.end {
            return fail("start must not be after end");
        }
        if self.registration_open > self.registration_close {
            return fail("registration must open before it closes");
        }
        if self.registration_open > self.end {
            return fail("registration must open before the event ends");
        }
        if self.num_slots < 0 || self.num_waiting_list < 0 {
            return fail("slot counts must not be negative");
        }
        if self.num_online_slots < 0 || self.num_online_slots > self.num_slots {
            return fail("online slots must be within [0, num_slots]");
        }
        if self.event_type.requires_activity && self.activity_types.is_empty() {
            return fail("this event type requires at least one activity");
        }
        if self.leaders.is_empty() {
            return fail("an event needs at least one leader");
        }
        if let Some(main) = &self.main_leader_id {
            if !self.is_leader(main) {
                return fail("main leader must be one of the leaders");
            }
        }
        for activity in &self.activity_types {
            if !self.leaders.iter().any(|l| can_lead(&l.id, &activity.id)) {
                return Err(DomainError::Validation(format!(
                    "no leader may lead activity {}",
                    activity.short_name
                )));
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_valid_event_passes() {
        let leader = Uuid::new_v4();
        let event = outing(activity("alpi"), leader);
        assert!(event.validate_invariants(|_, _| true).is_ok());
    }

    #[test]
    fn test_midnight_event_spans_the_day() {
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        event.start = datetime(2026, 11, 14, 0);
        event.end = event.start;
        let (start, end) = event.schedule_span();
        assert!(start < event.start);
        assert_eq!(end, start + Duration::hours(18));

        let mut morning = outing(activity("alpi"), Uuid::new_v4());
        morning.start = datetime(2026, 11, 14, 8);
        morning.end = datetime(2026, 11, 14, 12);
        assert!(morning.overlaps(start, end));
        assert!(!morning.overlaps(datetime(2026, 11, 14, 12), datetime(2026, 11, 14, 14)));
    }

    #[test]
    fn test_online_slots_bounded_by_slots() {
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        event.num_online_slots = event.num_slots + 1;
        assert!(event.validate_invariants(|_, _| true).is_err());
    }

    #[test]
    fn test_activity_must_be_leadable() {
        let event = outing(activity("alpi"), Uuid::new_v4());
        assert!(matches!(
            event.validate_invariants(|_, _| false),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_registration_window_ordering() {
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        event.registration_open = event.end + chrono::Duration::hours(1);
        event.registration_close = event.registration_open;
        assert!(event.validate_invariants(|_, _| true).is_err());
    }

    #[test]
    fn test_registration_open_window_is_inclusive() {
        let event = outing(activity("alpi"), Uuid::new_v4());
        assert!(event.is_registration_open_at(event.registration_open));
        assert!(event.is_registration_open_at(event.registration_close));
        assert!(!event.is_registration_open_at(event.registration_close + chrono::Duration::seconds(1)));
    }
}
