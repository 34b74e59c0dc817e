// ============================================================================
// Collectives Core - Registration Service
// File: crates/collectives-core/src/services/registration_service.rs
// Description: Registration state machine commands
// ============================================================================
//! Every command runs in one transaction: the event row is locked first,
//! slot counts are read under that lock, then the sanction engine and the
//! waiting-list promoter run before the single commit.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::access::{self, Placement, RegistrationFacts};
use crate::capacity::Capacity;
use crate::catalog::Capabilities;
use crate::context::RequestContext;
use crate::domain::{
    Absence, Event, EventStatus, Registration, RegistrationLevel, RegistrationStatus, RoleKind, User,
};
use crate::error::DomainError;
use crate::oracle::{self, MembershipOracle};
use crate::promoter::{promote_waiting_list, schedule_conflicts};
use crate::repositories::{Transaction, UnitOfWork};
use crate::sanctions::{reconcile_user, SanctionPolicy};

pub struct RegistrationService<U: UnitOfWork + ?Sized, O: MembershipOracle + ?Sized> {
    uow: Arc<U>,
    oracle: Arc<O>,
}

impl<U: UnitOfWork + ?Sized, O: MembershipOracle + ?Sized> RegistrationService<U, O> {
    pub fn new(uow: Arc<U>, oracle: Arc<O>) -> Self {
        Self { uow, oracle }
    }

    /// Registers the caller to `event_id`, on a slot or on the waiting list.
    ///
    /// Asking again while already registered returns the current
    /// registration unchanged.
    pub async fn self_register(
        &self,
        ctx: &RequestContext,
        event_id: &Uuid,
    ) -> Result<Registration, DomainError> {
        let user_id = ctx.require_member()?.user_id;

        // 1. Refresh the license before any lock is taken
        let refreshed = self.refresh_license(ctx, &user_id, event_id).await?;

        // 2. Lock the event and read its registrations
        let mut tx = self.uow.begin().await?;
        let event = lock_event(tx.as_mut(), event_id).await?;
        let mut user = tx
            .find_user(&user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;
        if let Some(expiry) = refreshed {
            tx.update_license_expiry(&user_id, expiry).await?;
            user.license_expiry_date = Some(expiry);
        }
        let registrations = tx.event_registrations(event_id).await?;

        // 3. Repeated attempts are no-ops
        if let Some(existing) = registrations
            .iter()
            .find(|r| r.user_id == user_id && !r.status.is_terminal())
            .cloned()
        {
            debug!(registration_id = %existing.id, "already registered, nothing to do");
            tx.commit().await?;
            return Ok(existing);
        }

        // 4. Decide
        let badges = tx.user_badges(&user_id).await?;
        let conflicts = schedule_conflicts(tx.as_mut(), &user_id, &event, false).await?;
        let facts = RegistrationFacts {
            user: &user,
            badges: &badges,
            registrations: &registrations,
            schedule_conflicts: &conflicts,
        };
        let placement = access::may_self_register(ctx, &event, &facts).inspect_err(|e| {
            warn!(event_id = %event_id, user_id = %user_id, error = %e, "self-registration refused");
        })?;

        let status = match placement {
            Placement::Holding if event.requires_payment => RegistrationStatus::PaymentPending,
            Placement::Holding => RegistrationStatus::SelfRegistered,
            Placement::Waiting => RegistrationStatus::WaitingList,
        };
        let registration = Registration::new(user_id, event.id, status, true, ctx.now);
        tx.insert_registration(&registration).await?;
        tx.commit().await?;

        info!(
            event_id = %event_id,
            user_id = %user_id,
            registration_id = %registration.id,
            status = status.as_str(),
            "member self-registered"
        );
        Ok(registration)
    }

    /// Read-only version of [`Self::self_register`]: where the caller would land.
    pub async fn check_self_register(
        &self,
        ctx: &RequestContext,
        event_id: &Uuid,
    ) -> Result<Placement, DomainError> {
        let user_id = ctx.require_member()?.user_id;
        let mut tx = self.uow.begin().await?;
        let event = tx
            .find_event(event_id)
            .await?
            .ok_or_else(|| DomainError::not_found("event", event_id))?;
        let user = tx
            .find_user(&user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;
        let registrations = tx.event_registrations(event_id).await?;
        let badges = tx.user_badges(&user_id).await?;
        let conflicts = schedule_conflicts(tx.as_mut(), &user_id, &event, false).await?;
        let facts = RegistrationFacts {
            user: &user,
            badges: &badges,
            registrations: &registrations,
            schedule_conflicts: &conflicts,
        };
        access::may_self_register(ctx, &event, &facts)
    }

    /// Registers `user_id` on behalf of a leader. An existing registration is
    /// updated in place; a waiter is moved onto a slot.
    pub async fn leader_admit(
        &self,
        ctx: &RequestContext,
        event_id: &Uuid,
        user_id: &Uuid,
        level: RegistrationLevel,
    ) -> Result<Registration, DomainError> {
        let mut tx = self.uow.begin().await?;
        let event = lock_event(tx.as_mut(), event_id).await?;
        require_admit(ctx, &event)?;

        if event.status == EventStatus::Cancelled {
            return Err(DomainError::InvalidState("event is cancelled".into()));
        }
        if event.is_leader(user_id) {
            return Err(DomainError::not_permitted("leaders are not registered to their own event"));
        }
        let user = tx
            .find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;
        if level == RegistrationLevel::CoLeader {
            require_co_leader(tx.as_mut(), ctx, &user, &event).await?;
        }

        let registrations = tx.event_registrations(event_id).await?;
        let capacity = Capacity::compute(&event, &registrations);
        let admitted = if event.requires_payment {
            RegistrationStatus::PaymentPending
        } else {
            RegistrationStatus::ActiveByLeader
        };

        let existing = registrations
            .iter()
            .find(|r| r.user_id == *user_id && !r.status.is_terminal())
            .cloned();
        let registration = match existing {
            Some(mut registration) => {
                if registration.status.is_waiting() {
                    if capacity.free_slots() <= 0 {
                        return Err(DomainError::CapacityExhausted);
                    }
                    registration.transition(admitted)?;
                    registration.is_self = false;
                }
                registration.level = level;
                tx.update_registration(&registration).await?;
                registration
            }
            None => {
                if capacity.free_slots() <= 0 {
                    warn!(event_id = %event_id, ?capacity, "leader admission refused, event full");
                    return Err(DomainError::CapacityExhausted);
                }
                let mut registration = Registration::new(*user_id, event.id, admitted, false, ctx.now);
                registration.level = level;
                tx.insert_registration(&registration).await?;
                registration
            }
        };
        tx.commit().await?;

        info!(
            event_id = %event_id,
            user_id = %user_id,
            registration_id = %registration.id,
            status = registration.status.as_str(),
            level = level.as_str(),
            "member admitted by leader"
        );
        Ok(registration)
    }

    /// Cancellation by the registered member.
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        registration_id: &Uuid,
    ) -> Result<Registration, DomainError> {
        let caller_id = ctx.require_member()?.user_id;
        let mut tx = self.uow.begin().await?;
        let (mut registration, event) = lock_registration(tx.as_mut(), registration_id).await?;

        if registration.user_id != caller_id {
            return Err(DomainError::not_permitted("only the registered member may cancel"));
        }
        if event.has_started(ctx.now) {
            return Err(DomainError::InvalidState("event has already started".into()));
        }

        let was_holding = registration.status.is_holding_slot();
        let target = if was_holding && ctx.now > event.registration_close {
            RegistrationStatus::LateSelfUnregistered
        } else {
            RegistrationStatus::SelfUnregistered
        };
        registration.transition(target)?;
        tx.update_registration(&registration).await?;

        // A late cancellation leaves the slot to leader admission only
        let promoted = if was_holding && target == RegistrationStatus::SelfUnregistered {
            promote_waiting_list(tx.as_mut(), &event, ctx.now).await?
        } else {
            Vec::new()
        };
        tx.commit().await?;

        info!(
            registration_id = %registration_id,
            status = target.as_str(),
            promoted = promoted.len(),
            "registration cancelled"
        );
        Ok(registration)
    }

    pub async fn reject(
        &self,
        ctx: &RequestContext,
        registration_id: &Uuid,
    ) -> Result<Registration, DomainError> {
        let mut tx = self.uow.begin().await?;
        let (mut registration, event) = lock_registration(tx.as_mut(), registration_id).await?;
        require_admit(ctx, &event)?;

        if registration.status.is_terminal() {
            return Err(DomainError::InvalidState(format!(
                "registration is already {}",
                registration.status.as_str()
            )));
        }
        let was_holding = registration.status.is_holding_slot();
        registration.transition(RegistrationStatus::Rejected)?;
        tx.update_registration(&registration).await?;
        if was_holding {
            promote_waiting_list(tx.as_mut(), &event, ctx.now).await?;
        }
        tx.commit().await?;

        info!(registration_id = %registration_id, event_id = %event.id, "registration rejected");
        Ok(registration)
    }

    pub async fn change_level(
        &self,
        ctx: &RequestContext,
        registration_id: &Uuid,
        level: RegistrationLevel,
    ) -> Result<Registration, DomainError> {
        let mut tx = self.uow.begin().await?;
        let (mut registration, event) = lock_registration(tx.as_mut(), registration_id).await?;
        require_admit(ctx, &event)?;

        if registration.status.is_terminal() {
            return Err(DomainError::InvalidState("registration is no longer active".into()));
        }
        if level == RegistrationLevel::CoLeader {
            let user = tx
                .find_user(&registration.user_id)
                .await?
                .ok_or_else(|| DomainError::not_found("user", registration.user_id))?;
            require_co_leader(tx.as_mut(), ctx, &user, &event).await?;
        }
        registration.level = level;
        tx.update_registration(&registration).await?;
        tx.commit().await?;

        info!(registration_id = %registration_id, level = level.as_str(), "registration level changed");
        Ok(registration)
    }

    /// Removes a registration row. The user's sanctions are recomputed since
    /// the row may have been an unjustified absence.
    pub async fn delete_registration(
        &self,
        ctx: &RequestContext,
        registration_id: &Uuid,
    ) -> Result<(), DomainError> {
        let mut tx = self.uow.begin().await?;
        let (registration, event) = lock_registration(tx.as_mut(), registration_id).await?;
        require_admit(ctx, &event)?;

        tx.delete_registration(registration_id).await?;
        reconcile_user(tx.as_mut(), &registration.user_id, ctx.now, policy(ctx)).await?;
        if registration.status.is_holding_slot() {
            promote_waiting_list(tx.as_mut(), &event, ctx.now).await?;
        }
        tx.commit().await?;

        info!(
            registration_id = %registration_id,
            user_id = %registration.user_id,
            status = registration.status.as_str(),
            "registration deleted"
        );
        Ok(())
    }

    /// Records attendance outcomes once the event has started. Calling it
    /// again with a different outcome reclassifies the registration.
    pub async fn close_event(
        &self,
        ctx: &RequestContext,
        event_id: &Uuid,
        outcomes: &[(Uuid, Absence)],
    ) -> Result<Vec<Registration>, DomainError> {
        let mut tx = self.uow.begin().await?;
        let event = lock_event(tx.as_mut(), event_id).await?;
        require_admit(ctx, &event)?;
        if !event.has_started(ctx.now) {
            return Err(DomainError::InvalidState("event has not started yet".into()));
        }

        let registrations = tx.event_registrations(event_id).await?;
        let mut touched_users = BTreeSet::new();
        let mut released = false;
        let mut changed = Vec::new();
        for (registration_id, absence) in outcomes {
            let mut registration = registrations
                .iter()
                .find(|r| r.id == *registration_id)
                .cloned()
                .ok_or_else(|| DomainError::not_found("registration", registration_id))?;
            let target = absence.status();
            if registration.status == target {
                continue;
            }
            released |= registration.status.is_holding_slot();
            registration.transition(target)?;
            tx.update_registration(&registration).await?;
            touched_users.insert(registration.user_id);
            changed.push(registration);
        }

        // Sanctions first, then promotion, all before the single commit
        for user_id in &touched_users {
            reconcile_user(tx.as_mut(), user_id, ctx.now, policy(ctx)).await?;
        }
        if released {
            promote_waiting_list(tx.as_mut(), &event, ctx.now).await?;
        }
        tx.commit().await?;

        info!(event_id = %event_id, changed = changed.len(), "event closed");
        Ok(changed)
    }

    /// External payment confirmation.
    pub async fn payment_confirmed(
        &self,
        ctx: &RequestContext,
        registration_id: &Uuid,
    ) -> Result<Registration, DomainError> {
        let mut tx = self.uow.begin().await?;
        let (mut registration, event) = lock_registration(tx.as_mut(), registration_id).await?;
        require_payment_authority(ctx, &event)?;
        if !event.requires_payment {
            return Err(DomainError::InvalidState("event does not require payment".into()));
        }

        let target = if registration.is_self {
            RegistrationStatus::SelfRegistered
        } else {
            RegistrationStatus::ActiveByLeader
        };
        if registration.status == target {
            return Ok(registration);
        }
        registration.transition(target)?;
        tx.update_registration(&registration).await?;
        tx.commit().await?;

        info!(registration_id = %registration_id, status = target.as_str(), "payment confirmed");
        Ok(registration)
    }

    /// External payment expiry: the pending row disappears and its slot is freed.
    pub async fn payment_expired(
        &self,
        ctx: &RequestContext,
        registration_id: &Uuid,
    ) -> Result<(), DomainError> {
        let mut tx = self.uow.begin().await?;
        let (registration, event) = lock_registration(tx.as_mut(), registration_id).await?;
        require_payment_authority(ctx, &event)?;
        if registration.status != RegistrationStatus::PaymentPending {
            return Err(DomainError::InvalidState(format!(
                "registration is {}",
                registration.status.as_str()
            )));
        }

        tx.delete_registration(registration_id).await?;
        promote_waiting_list(tx.as_mut(), &event, ctx.now).await?;
        tx.commit().await?;

        info!(registration_id = %registration_id, event_id = %event.id, "payment expired");
        Ok(())
    }

    /// Expires every `PaymentPending` registration older than the configured
    /// timeout, one transaction each. Safe to run concurrently or repeatedly.
    pub async fn purge_expired_payments(&self, ctx: &RequestContext) -> Result<usize, DomainError> {
        let cutoff = ctx.now - chrono::Duration::minutes(ctx.settings.payment_timeout_minutes);
        let stale = {
            let mut tx = self.uow.begin().await?;
            tx.stale_payment_registrations(cutoff).await?
        };

        let mut purged = 0;
        for candidate in stale {
            let mut tx = self.uow.begin().await?;
            let Some(event) = tx.lock_event(&candidate.event_id).await? else {
                continue;
            };
            // Re-check under the lock, the row may have been paid meanwhile
            match tx.find_registration(&candidate.id).await? {
                Some(current)
                    if current.status == RegistrationStatus::PaymentPending
                        && current.registration_time < cutoff => {}
                _ => continue,
            }
            tx.delete_registration(&candidate.id).await?;
            promote_waiting_list(tx.as_mut(), &event, ctx.now).await?;
            tx.commit().await?;
            purged += 1;
        }

        if purged > 0 {
            info!(purged, %cutoff, "expired payments purged");
        }
        Ok(purged)
    }

    /// New license expiry when the current one does not cover the event and
    /// the federation knows better.
    ///
    /// The oracle is only asked once the event itself would take the member:
    /// a pending event or a closed window is refused without a remote call.
    async fn refresh_license(
        &self,
        ctx: &RequestContext,
        user_id: &Uuid,
        event_id: &Uuid,
    ) -> Result<Option<NaiveDate>, DomainError> {
        let (user, event, badges, registered) = {
            let mut tx = self.uow.begin().await?;
            let user = tx
                .find_user(user_id)
                .await?
                .ok_or_else(|| DomainError::not_found("user", user_id))?;
            let event = tx
                .find_event(event_id)
                .await?
                .ok_or_else(|| DomainError::not_found("event", event_id))?;
            let badges = tx.user_badges(user_id).await?;
            let registered = tx
                .event_registrations(event_id)
                .await?
                .iter()
                .any(|r| r.user_id == *user_id && !r.status.is_terminal());
            (user, event, badges, registered)
        };
        if registered || user.license_valid_at(event.end) || !user.is_oracle_backed() {
            return Ok(None);
        }
        access::event_accepts_self_registration(&event, &badges, ctx.now)?;

        let deadline = Duration::from_millis(ctx.settings.oracle_timeout_ms);
        let validity = oracle::check_with_deadline(self.oracle.as_ref(), &user.license, deadline).await?;
        // The stored expiry is the first day no longer covered
        let expiry = validity.valid_until.succ_opt().unwrap_or(validity.valid_until);
        if user.license_expiry_date.is_some_and(|current| current >= expiry) {
            return Ok(None);
        }
        info!(user_id = %user_id, %expiry, "license refreshed from membership oracle");
        Ok(Some(expiry))
    }
}

fn policy(ctx: &RequestContext) -> SanctionPolicy {
    SanctionPolicy::from(ctx.settings.as_ref())
}

fn require_admit(ctx: &RequestContext, event: &Event) -> Result<(), DomainError> {
    ctx.require_member()?;
    if access::may_admit(&ctx.caller, event) {
        Ok(())
    } else {
        warn!(event_id = %event.id, caller = ?ctx.caller.user_id(), "leader command refused");
        Err(DomainError::not_permitted("only leaders and supervisors of this event may do this"))
    }
}

fn require_payment_authority(ctx: &RequestContext, event: &Event) -> Result<(), DomainError> {
    let caps = ctx.require_member()?;
    if access::may_admit(&ctx.caller, event) || caps.has_role(&[RoleKind::Accountant]) {
        Ok(())
    } else {
        Err(DomainError::not_permitted("payment signals need a leader or an accountant"))
    }
}

/// The registered user must be able to co-lead one of the event's activities.
async fn require_co_leader(
    tx: &mut dyn Transaction,
    ctx: &RequestContext,
    user: &User,
    event: &Event,
) -> Result<(), DomainError> {
    let roles = tx.user_roles(&user.id).await?;
    let caps = Capabilities::resolve(user, &roles, ctx.now);
    if event.activity_ids().any(|activity| caps.can_co_lead(&activity)) {
        Ok(())
    } else {
        Err(DomainError::not_permitted("user cannot co-lead this event"))
    }
}

async fn lock_event(tx: &mut dyn Transaction, event_id: &Uuid) -> Result<Event, DomainError> {
    tx.lock_event(event_id)
        .await?
        .ok_or_else(|| DomainError::not_found("event", event_id))
}

/// Locks the registration's event, then re-reads the registration under the lock.
async fn lock_registration(
    tx: &mut dyn Transaction,
    registration_id: &Uuid,
) -> Result<(Registration, Event), DomainError> {
    let not_found = || DomainError::not_found("registration", registration_id);
    let registration = tx.find_registration(registration_id).await?.ok_or_else(not_found)?;
    let event = lock_event(tx, &registration.event_id).await?;
    let registration = tx.find_registration(registration_id).await?.ok_or_else(not_found)?;
    Ok((registration, event))
}
