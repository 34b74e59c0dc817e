// ============================================================================
// Collectives Core - Visibility Filter
// File: crates/collectives-core/src/visibility.rs
// ============================================================================
//! Restriction applied to every event-centric listing.
//!
//! The restriction only depends on the caller's capabilities and the request
//! time, never on per-event lookups, so it composes with user filters and is
//! compiled into the same query.

use std::collections::BTreeSet;

use chrono::Duration;
use tracing::debug;

use crate::catalog::{ActivityScope, Caller, Capabilities};
use crate::context::RequestContext;
use crate::domain::{EventStatus, EventVisibility};
use crate::predicate::{DateBound, EventPredicate};

/// Predicate selecting the events the caller is entitled to list.
pub fn visibility_predicate(ctx: &RequestContext) -> EventPredicate {
    match &ctx.caller {
        Caller::Anonymous => {
            let horizon = ctx.now - Duration::days(ctx.settings.max_history_for_anonymous_days);
            EventPredicate::and(vec![
                EventPredicate::StatusNotIn(vec![EventStatus::Pending]),
                EventPredicate::VisibilityNe(EventVisibility::Activity),
                EventPredicate::End(DateBound::AtLeast(horizon)),
            ])
        }
        Caller::Member(caps) if caps.is_moderator() => EventPredicate::True,
        Caller::Member(caps) => {
            let predicate = member_predicate(caps);
            debug!(user_id = %caps.user_id, ?predicate, "visibility predicate");
            predicate
        }
    }
}

fn member_predicate(caps: &Capabilities) -> EventPredicate {
    let led = EventPredicate::LedBy(caps.user_id);

    let supervised = match caps.supervised_activities() {
        ActivityScope::All => EventPredicate::True,
        ActivityScope::Only(ids) if ids.is_empty() => EventPredicate::False,
        ActivityScope::Only(ids) => EventPredicate::AnyActivityIn(ids),
    };
    let status_rule = EventPredicate::or(vec![
        EventPredicate::StatusNotIn(vec![EventStatus::Pending]),
        supervised,
        led.clone(),
    ]);

    let role_activities: BTreeSet<_> =
        caps.roles_of().iter().filter_map(|(_, activity)| *activity).collect();
    let with_role = if role_activities.is_empty() {
        EventPredicate::False
    } else {
        EventPredicate::AnyActivityIn(role_activities)
    };
    let activity_less = if caps.has_any_role() {
        EventPredicate::HasNoActivity
    } else {
        EventPredicate::False
    };
    let visibility_rule = EventPredicate::or(vec![
        EventPredicate::VisibilityNe(EventVisibility::Activity),
        with_role,
        activity_less,
        led,
    ]);

    EventPredicate::and(vec![status_rule, visibility_rule])
}
