// ============================================================================
// Collectives Core - Access Evaluator
// File: crates/collectives-core/src/access.rs
// ============================================================================
//! Sole policy surface deciding what a caller may do with an event.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::capacity::Capacity;
use crate::catalog::Caller;
use crate::context::RequestContext;
use crate::domain::{Badge, Event, EventStatus, Registration, RegistrationStatus, User};
use crate::error::DomainError;
use crate::visibility::visibility_predicate;

/// Where a successful self-registration lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// A slot is free: the registration holds it
    Holding,
    /// Online slots are exhausted but the waiting list has room
    Waiting,
}

/// State of the candidate and of the event, read under the event lock.
pub struct RegistrationFacts<'a> {
    pub user: &'a User,
    pub badges: &'a [Badge],
    /// Every registration row of the event
    pub registrations: &'a [Registration],
    /// The user's slots on other outings overlapping this one
    pub schedule_conflicts: &'a [Registration],
}

pub fn may_edit(caller: &Caller, event: &Event) -> bool {
    let Some(caps) = caller.capabilities() else {
        return false;
    };
    event.is_leader(&caps.user_id)
        || caps.is_admin()
        || event.activity_ids().any(|activity| caps.supervises(&activity))
}

pub fn may_admit(caller: &Caller, event: &Event) -> bool {
    may_edit(caller, event)
}

pub fn may_create_events(caller: &Caller) -> bool {
    caller.capabilities().is_some_and(|caps| caps.can_create_events())
}

pub fn may_view(ctx: &RequestContext, event: &Event) -> bool {
    may_edit(&ctx.caller, event) || visibility_predicate(ctx).matches(event)
}

/// Hotline, supervisors and leaders may look at other members' registrations.
pub fn may_read_other_users(caller: &Caller) -> bool {
    caller.capabilities().is_some_and(|caps| caps.has_any_role())
}

pub fn has_blocking_sanction(badges: &[Badge], now: NaiveDateTime) -> bool {
    badges.iter().any(|b| b.is_blocking_at(now.date()))
}

/// Only events whose type requires an activity are exclusive in time.
pub fn clashes_with_schedule(event: &Event, schedule_conflicts: &[Registration]) -> bool {
    event.event_type.requires_activity && !schedule_conflicts.is_empty()
}

/// Whether a waiting user can still be promoted.
pub fn eligible_for_promotion(
    user: &User,
    badges: &[Badge],
    schedule_conflicts: &[Registration],
    event: &Event,
    now: NaiveDateTime,
) -> bool {
    user.is_active(now)
        && user.license_valid_at(event.end)
        && !has_blocking_sanction(badges, now)
        && !clashes_with_schedule(event, schedule_conflicts)
}

/// Refusals that depend only on the event and the member's sanctions.
pub fn event_accepts_self_registration(
    event: &Event,
    badges: &[Badge],
    now: NaiveDateTime,
) -> Result<(), DomainError> {
    if event.status != EventStatus::Confirmed {
        return Err(DomainError::InvalidState(format!(
            "event is {}",
            event.status.as_str()
        )));
    }
    if !event.is_registration_open_at(now) {
        return Err(DomainError::RegistrationClosed);
    }
    if has_blocking_sanction(badges, now) {
        return Err(DomainError::Blocked);
    }
    Ok(())
}

/// Decides whether the caller may register themself and where they land.
///
/// An existing non-terminal registration is not handled here: the caller of
/// this function treats it as an idempotent no-op before asking.
pub fn may_self_register(
    ctx: &RequestContext,
    event: &Event,
    facts: &RegistrationFacts<'_>,
) -> Result<Placement, DomainError> {
    let caps = ctx.require_member()?;
    let user = facts.user;
    let now = ctx.now;

    if caps.user_id != user.id {
        return Err(DomainError::not_permitted("members can only register themselves"));
    }
    if !user.enabled {
        return Err(DomainError::not_permitted("account is disabled"));
    }
    if !user.license_valid_at(now) {
        return Err(DomainError::LicenseInvalid);
    }
    if event.is_leader(&user.id) {
        return Err(DomainError::not_permitted("leaders cannot register to their own event"));
    }
    let own = || facts.registrations.iter().filter(|r| r.user_id == user.id);
    if own().any(|r| r.status == RegistrationStatus::Rejected) {
        return Err(DomainError::not_permitted("registration was rejected by a leader"));
    }
    if own().any(|r| !r.status.is_terminal()) {
        return Err(DomainError::Conflict("already registered".into()));
    }
    event_accepts_self_registration(event, facts.badges, now)?;
    if !user.license_valid_at(event.end) {
        return Err(DomainError::LicenseExpired);
    }
    if clashes_with_schedule(event, facts.schedule_conflicts) {
        return Err(DomainError::Conflict("already registered to an outing at the same time".into()));
    }

    let capacity = Capacity::compute(event, facts.registrations);
    debug!(event_id = %event.id, ?capacity, "self-registration capacity");
    if capacity.free_online() > 0 {
        Ok(Placement::Holding)
    } else if capacity.free_waiting() > 0 {
        Ok(Placement::Waiting)
    } else if capacity.num_waiting_list > 0 {
        Err(DomainError::WaitingListFull)
    } else {
        Err(DomainError::CapacityExhausted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::Capabilities;
    use crate::domain::event::fixtures::*;
    use crate::domain::{BadgeKind, Role, RoleKind, UserType};
    use chrono::NaiveDate;
    use collectives_shared::ClubSettings;
    use uuid::Uuid;

    fn user() -> User {
        User::new(
            "climber@example.org".into(),
            "740000000042".into(),
            "Clem".into(),
            "Climber".into(),
            UserType::Extranet,
            NaiveDate::from_ymd_opt(2027, 10, 1),
        )
        .unwrap()
    }

    fn ctx_for(user: &User) -> RequestContext {
        RequestContext::member(
            Capabilities::empty(user.id),
            datetime(2026, 10, 16, 9),
            Arc::new(ClubSettings::default()),
        )
    }

    fn check(user: &User, event: &Event, badges: &[Badge], regs: &[Registration]) -> Result<Placement, DomainError> {
        let facts = RegistrationFacts { user, badges, registrations: regs, schedule_conflicts: &[] };
        may_self_register(&ctx_for(user), event, &facts)
    }

    #[test]
    fn test_supervisor_may_edit_event_of_activity() {
        let alpi = activity("alpi");
        let event = outing(alpi.clone(), Uuid::new_v4());
        let sup = Uuid::new_v4();
        let caps = Capabilities::from_roles(
            sup,
            &[Role::new(sup, RoleKind::ActivitySupervisor, Some(alpi.id)).unwrap()],
        );
        assert!(may_edit(&Caller::Member(caps), &event));
        assert!(!may_edit(&Caller::Anonymous, &event));
        assert!(!may_edit(&Caller::Member(Capabilities::empty(Uuid::new_v4())), &event));
    }

    #[test]
    fn test_holding_when_online_slot_free() {
        let u = user();
        let event = outing(activity("alpi"), Uuid::new_v4());
        assert_eq!(check(&u, &event, &[], &[]), Ok(Placement::Holding));
    }

    #[test]
    fn test_waiting_then_full() {
        let u = user();
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        event.num_online_slots = 1;
        event.num_waiting_list = 1;
        let taken = Registration::new(Uuid::new_v4(), event.id, RegistrationStatus::SelfRegistered, true, event.registration_open);
        assert_eq!(check(&u, &event, &[], &[taken.clone()]), Ok(Placement::Waiting));

        let waiting = Registration::new(Uuid::new_v4(), event.id, RegistrationStatus::WaitingList, true, event.registration_open);
        assert_eq!(check(&u, &event, &[], &[taken.clone(), waiting]), Err(DomainError::WaitingListFull));

        event.num_waiting_list = 0;
        assert_eq!(check(&u, &event, &[], &[taken]), Err(DomainError::CapacityExhausted));
    }

    #[test]
    fn test_leader_cannot_self_register() {
        let u = user();
        let event = outing(activity("alpi"), u.id);
        assert!(matches!(check(&u, &event, &[], &[]), Err(DomainError::NotPermitted(_))));
    }

    #[test]
    fn test_rejected_user_cannot_come_back() {
        let u = user();
        let event = outing(activity("alpi"), Uuid::new_v4());
        let rejected = Registration::new(u.id, event.id, RegistrationStatus::Rejected, true, event.registration_open);
        assert!(matches!(check(&u, &event, &[], &[rejected]), Err(DomainError::NotPermitted(_))));
    }

    #[test]
    fn test_window_and_status() {
        let u = user();
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        event.registration_close = datetime(2026, 10, 15, 0);
        assert_eq!(check(&u, &event, &[], &[]), Err(DomainError::RegistrationClosed));
        event.status = EventStatus::Pending;
        assert!(matches!(check(&u, &event, &[], &[]), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_suspension_blocks() {
        let u = user();
        let event = outing(activity("alpi"), Uuid::new_v4());
        let now = datetime(2026, 10, 16, 9);
        let suspended = Badge::automatic(u.id, BadgeKind::Suspended, Uuid::new_v4(), now, 9);
        assert_eq!(check(&u, &event, &[suspended], &[]), Err(DomainError::Blocked));
    }

    #[test]
    fn test_license_must_cover_event_end() {
        let mut u = user();
        u.license_expiry_date = NaiveDate::from_ymd_opt(2026, 11, 1);
        let event = outing(activity("alpi"), Uuid::new_v4());
        assert_eq!(check(&u, &event, &[], &[]), Err(DomainError::LicenseExpired));
        u.license_expiry_date = NaiveDate::from_ymd_opt(2026, 10, 1);
        assert_eq!(check(&u, &event, &[], &[]), Err(DomainError::LicenseInvalid));
    }

    #[test]
    fn test_overlapping_outing_is_refused() {
        let u = user();
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        let other = Registration::new(u.id, Uuid::new_v4(), RegistrationStatus::SelfRegistered, true, event.registration_open);
        let clashing = std::slice::from_ref(&other);
        let facts = RegistrationFacts { user: &u, badges: &[], registrations: &[], schedule_conflicts: clashing };
        assert!(matches!(may_self_register(&ctx_for(&u), &event, &facts), Err(DomainError::Conflict(_))));

        // Evening talks and other activity-free events are not exclusive
        event.event_type.requires_activity = false;
        assert_eq!(may_self_register(&ctx_for(&u), &event, &facts), Ok(Placement::Holding));
    }

    #[test]
    fn test_event_state_checked_without_user() {
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        let now = datetime(2026, 10, 16, 9);
        assert_eq!(event_accepts_self_registration(&event, &[], now), Ok(()));
        event.status = EventStatus::Pending;
        assert!(matches!(event_accepts_self_registration(&event, &[], now), Err(DomainError::InvalidState(_))));
    }
}
