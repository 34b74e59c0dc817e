// ============================================================================
// Collectives Core - Waiting-List Promoter
// File: crates/collectives-core/src/promoter.rs
// Description: Moves waiters onto freed online slots, FIFO
// ============================================================================
//! Promotion only happens while the event is confirmed and its registration
//! window is open. Waiters are visited in `(registration_time, id)` order;
//! ineligible ones are skipped but keep their place on the list. A promoted
//! member leaves the waiting lists of the outings overlapping this one.

use chrono::NaiveDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::access::eligible_for_promotion;
use crate::capacity::Capacity;
use crate::domain::{Event, EventStatus, Registration, RegistrationStatus};
use crate::error::DomainError;
use crate::repositories::Transaction;

/// Status a promoted waiter lands in.
pub fn promoted_status(event: &Event) -> RegistrationStatus {
    if event.requires_payment {
        RegistrationStatus::PaymentPending
    } else {
        RegistrationStatus::SelfRegistered
    }
}

/// Picks the waiters to promote, in order.
///
/// `eligible` is asked once per waiter visited; the walk stops as soon as
/// no online slot is left.
pub fn select_promotions<'a>(
    event: &Event,
    registrations: &'a [Registration],
    now: NaiveDateTime,
    mut eligible: impl FnMut(&Registration) -> bool,
) -> Vec<&'a Registration> {
    if event.status != EventStatus::Confirmed || !event.is_registration_open_at(now) {
        return Vec::new();
    }

    let mut free = Capacity::compute(event, registrations).free_online();
    let mut waiters: Vec<&Registration> = registrations
        .iter()
        .filter(|r| r.event_id == event.id && r.status.is_waiting())
        .collect();
    waiters.sort_by_key(|r| r.queue_key());

    let mut selected = Vec::new();
    for waiter in waiters {
        if free <= 0 {
            break;
        }
        if eligible(waiter) {
            selected.push(waiter);
            free -= 1;
        }
    }
    selected
}

/// Slots `user_id` holds on other outings overlapping `event`, or their
/// waiting-list rows too with `include_waiting`.
pub async fn schedule_conflicts(
    tx: &mut dyn Transaction,
    user_id: &Uuid,
    event: &Event,
    include_waiting: bool,
) -> Result<Vec<Registration>, DomainError> {
    if !event.event_type.requires_activity {
        return Ok(Vec::new());
    }
    let (start, end) = event.schedule_span();
    tx.registrations_during(user_id, start, end, &event.id, include_waiting).await
}

/// Removes the other waiting-list rows of a member who just got a slot.
async fn leave_overlapping_waiting_lists(
    tx: &mut dyn Transaction,
    promoted: &Registration,
    event: &Event,
) -> Result<(), DomainError> {
    let overlapping = schedule_conflicts(tx, &promoted.user_id, event, true).await?;
    for other in overlapping.into_iter().filter(|r| r.status.is_waiting()) {
        // Same lock order as any command on that event, then re-read
        tx.lock_event(&other.event_id).await?;
        if tx.find_registration(&other.id).await?.is_some_and(|r| r.status.is_waiting()) {
            tx.delete_registration(&other.id).await?;
            info!(
                registration_id = %other.id,
                event_id = %other.event_id,
                user_id = %other.user_id,
                "overlapping waiting-list entry dropped"
            );
        }
    }
    Ok(())
}

/// Promotes waiters of `event` inside `tx`. The event must already be locked.
pub async fn promote_waiting_list(
    tx: &mut dyn Transaction,
    event: &Event,
    now: NaiveDateTime,
) -> Result<Vec<Registration>, DomainError> {
    let registrations = tx.event_registrations(&event.id).await?;
    if !registrations.iter().any(|r| r.status.is_waiting()) {
        return Ok(Vec::new());
    }

    // Eligibility needs the user rows and badges, loaded up front
    let mut eligible_ids = std::collections::HashSet::new();
    for waiter in registrations.iter().filter(|r| r.status.is_waiting()) {
        let Some(user) = tx.find_user(&waiter.user_id).await? else {
            continue;
        };
        let badges = tx.user_badges(&waiter.user_id).await?;
        let conflicts = schedule_conflicts(tx, &waiter.user_id, event, false).await?;
        if eligible_for_promotion(&user, &badges, &conflicts, event, now) {
            eligible_ids.insert(waiter.id);
        } else {
            debug!(registration_id = %waiter.id, "waiter skipped, not eligible");
        }
    }

    let target = promoted_status(event);
    let selected: Vec<Registration> =
        select_promotions(event, &registrations, now, |r| eligible_ids.contains(&r.id))
            .into_iter()
            .cloned()
            .collect();

    let mut promoted = Vec::with_capacity(selected.len());
    for mut registration in selected {
        registration.transition(target)?;
        registration.registration_time = now;
        tx.update_registration(&registration).await?;
        leave_overlapping_waiting_lists(tx, &registration, event).await?;
        info!(
            event_id = %event.id,
            registration_id = %registration.id,
            user_id = %registration.user_id,
            status = registration.status.as_str(),
            "waiter promoted"
        );
        promoted.push(registration);
    }
    Ok(promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::fixtures::*;
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        datetime(2026, 10, 16, 9)
    }

    fn event_with_one_slot() -> Event {
        let mut event = outing(activity("alpi"), Uuid::new_v4());
        event.num_slots = 1;
        event.num_online_slots = 1;
        event.num_waiting_list = 3;
        event
    }

    fn waiter(event: &Event, minutes: i64) -> Registration {
        Registration::new(
            Uuid::new_v4(),
            event.id,
            RegistrationStatus::WaitingList,
            true,
            now() - Duration::hours(2) + Duration::minutes(minutes),
        )
    }

    #[test]
    fn test_first_waiter_wins() {
        let event = event_with_one_slot();
        let regs = vec![waiter(&event, 5), waiter(&event, 1), waiter(&event, 3)];
        let picked = select_promotions(&event, &regs, now(), |_| true);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, regs[1].id);
    }

    #[test]
    fn test_ineligible_waiter_skipped() {
        let event = event_with_one_slot();
        let regs = vec![waiter(&event, 1), waiter(&event, 2)];
        let blocked = regs[0].id;
        let picked = select_promotions(&event, &regs, now(), |r| r.id != blocked);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, regs[1].id);
    }

    #[test]
    fn test_nothing_when_slots_taken() {
        let event = event_with_one_slot();
        let mut regs = vec![waiter(&event, 1)];
        regs.push(Registration::new(Uuid::new_v4(), event.id, RegistrationStatus::ActiveByLeader, false, now()));
        assert!(select_promotions(&event, &regs, now(), |_| true).is_empty());
    }

    #[test]
    fn test_no_promotion_outside_window() {
        let event = event_with_one_slot();
        let regs = vec![waiter(&event, 1)];
        let after_close = event.registration_close + Duration::minutes(1);
        assert!(select_promotions(&event, &regs, after_close, |_| true).is_empty());
    }

    #[test]
    fn test_paid_event_promotes_to_payment_pending() {
        let mut event = event_with_one_slot();
        assert_eq!(promoted_status(&event), RegistrationStatus::SelfRegistered);
        event.requires_payment = true;
        assert_eq!(promoted_status(&event), RegistrationStatus::PaymentPending);
    }
}
