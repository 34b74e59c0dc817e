// ============================================================================
// Collectives Core - Event Predicate
// File: crates/collectives-core/src/predicate.rs
// ============================================================================
//! Boolean expression over event attributes.
//!
//! Visibility rules and listing filters are both expressed as an
//! [`EventPredicate`]. The in-memory store evaluates it with
//! [`EventPredicate::matches`]; the PostgreSQL adapter compiles the same tree
//! into one `WHERE` clause, so a listing is a single set-based query.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::domain::{Event, EventStatus, EventVisibility};

/// Bound on a timestamp column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// `column >= value`
    AtLeast(NaiveDateTime),
    /// `column < value`
    Before(NaiveDateTime),
}

impl DateBound {
    pub fn admits(&self, value: NaiveDateTime) -> bool {
        match self {
            DateBound::AtLeast(bound) => value >= *bound,
            DateBound::Before(bound) => value < *bound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPredicate {
    True,
    False,
    And(Vec<EventPredicate>),
    Or(Vec<EventPredicate>),

    StatusIn(Vec<EventStatus>),
    StatusNotIn(Vec<EventStatus>),
    VisibilityNe(EventVisibility),
    /// Some activity of the event is in the set
    AnyActivityIn(BTreeSet<Uuid>),
    HasNoActivity,
    LedBy(Uuid),
    Start(DateBound),
    End(DateBound),
    /// Case-insensitive substring match on the title
    TitleLike(String),
    TitleEq(String),
    /// Event type short name
    EventTypeIn(Vec<String>),
    /// Activity type short name
    ActivityShortNameIn(Vec<String>),
    TagIn(Vec<String>),
    /// Case-insensitive substring match on any leader's full name
    LeaderNameLike(String),
}

impl EventPredicate {
    pub fn and(parts: Vec<EventPredicate>) -> Self {
        let parts: Vec<_> = parts.into_iter().filter(|p| *p != EventPredicate::True).collect();
        if parts.iter().any(|p| *p == EventPredicate::False) {
            return EventPredicate::False;
        }
        match parts.len() {
            0 => EventPredicate::True,
            1 => parts.into_iter().next().unwrap_or(EventPredicate::True),
            _ => EventPredicate::And(parts),
        }
    }

    pub fn or(parts: Vec<EventPredicate>) -> Self {
        let parts: Vec<_> = parts.into_iter().filter(|p| *p != EventPredicate::False).collect();
        if parts.iter().any(|p| *p == EventPredicate::True) {
            return EventPredicate::True;
        }
        match parts.len() {
            0 => EventPredicate::False,
            1 => parts.into_iter().next().unwrap_or(EventPredicate::False),
            _ => EventPredicate::Or(parts),
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        match self {
            EventPredicate::True => true,
            EventPredicate::False => false,
            EventPredicate::And(parts) => parts.iter().all(|p| p.matches(event)),
            EventPredicate::Or(parts) => parts.iter().any(|p| p.matches(event)),
            EventPredicate::StatusIn(statuses) => statuses.contains(&event.status),
            EventPredicate::StatusNotIn(statuses) => !statuses.contains(&event.status),
            EventPredicate::VisibilityNe(visibility) => event.visibility != *visibility,
            EventPredicate::AnyActivityIn(ids) => event.activity_ids().any(|id| ids.contains(&id)),
            EventPredicate::HasNoActivity => event.activity_types.is_empty(),
            EventPredicate::LedBy(user_id) => event.is_leader(user_id),
            EventPredicate::Start(bound) => bound.admits(event.start),
            EventPredicate::End(bound) => bound.admits(event.end),
            EventPredicate::TitleLike(needle) => contains_ci(&event.title, needle),
            EventPredicate::TitleEq(title) => event.title == *title,
            EventPredicate::EventTypeIn(names) => names.contains(&event.event_type.short_name),
            EventPredicate::ActivityShortNameIn(names) => {
                event.activity_types.iter().any(|a| names.contains(&a.short_name))
            }
            EventPredicate::TagIn(tags) => event.tags.iter().any(|t| tags.contains(t)),
            EventPredicate::LeaderNameLike(needle) => {
                event.leaders.iter().any(|l| contains_ci(&l.full_name, needle))
            }
        }
    }
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::fixtures::*;

    #[test]
    fn test_and_or_simplification() {
        assert_eq!(EventPredicate::and(vec![]), EventPredicate::True);
        assert_eq!(EventPredicate::or(vec![]), EventPredicate::False);
        assert_eq!(
            EventPredicate::and(vec![EventPredicate::True, EventPredicate::HasNoActivity]),
            EventPredicate::HasNoActivity
        );
        assert_eq!(
            EventPredicate::or(vec![EventPredicate::HasNoActivity, EventPredicate::True]),
            EventPredicate::True
        );
    }

    #[test]
    fn test_text_predicates_are_case_insensitive() {
        let event = outing(activity("alpi"), Uuid::new_v4());
        assert!(EventPredicate::TitleLike("moine".into()).matches(&event));
        assert!(EventPredicate::LeaderNameLike("ADA".into()).matches(&event));
        assert!(!EventPredicate::LeaderNameLike("bob".into()).matches(&event));
    }

    #[test]
    fn test_date_bounds() {
        let event = outing(activity("alpi"), Uuid::new_v4());
        assert!(EventPredicate::Start(DateBound::AtLeast(event.start)).matches(&event));
        assert!(!EventPredicate::Start(DateBound::Before(event.start)).matches(&event));
    }

    #[test]
    fn test_activity_short_name() {
        let event = outing(activity("alpi"), Uuid::new_v4());
        assert!(EventPredicate::ActivityShortNameIn(vec!["ski".into(), "alpi".into()]).matches(&event));
        assert!(!EventPredicate::HasNoActivity.matches(&event));
    }
}
