// ============================================================================
// Collectives Core - Sanction Engine
// File: crates/collectives-core/src/sanctions.rs
// Description: Warning and suspension badges derived from unjustified absences
// ============================================================================
//! The engine recomputes a user's automatic badges from scratch:
//!
//! 1. every `UnJustifiedAbsentee` registration has exactly one linked
//!    warning; warnings linked to any other registration are removed;
//! 2. valid warnings are ordered by `(creation_time, id)`; each one at
//!    position `threshold - 1` or later requires a valid `Suspended` badge
//!    linked to the same registration;
//! 3. still-valid linked suspensions that are no longer required are removed.
//!    Expired badges are kept as history and badges without a registration
//!    link (granted by hand) are never touched.
//!
//! [`plan`] is pure; [`reconcile_user`] applies it inside the caller's
//! transaction after locking the user row.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDateTime;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Badge, BadgeKind, Registration, RegistrationStatus};
use crate::error::DomainError;
use crate::repositories::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanctionPolicy {
    pub suspension_threshold: u32,
    pub federation_year_end_month: u32,
}

impl From<&collectives_shared::ClubSettings> for SanctionPolicy {
    fn from(settings: &collectives_shared::ClubSettings) -> Self {
        Self {
            suspension_threshold: settings.suspension_threshold,
            federation_year_end_month: settings.federation_year_end_month,
        }
    }
}

/// Badge changes bringing a user back to the computed state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SanctionPlan {
    pub create: Vec<Badge>,
    pub delete: Vec<Uuid>,
}

impl SanctionPlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

/// Computes the badge changes for `user_id`.
///
/// `unjustified` are the user's registrations currently in
/// `UnJustifiedAbsentee`; other entries are ignored.
pub fn plan(
    user_id: Uuid,
    badges: &[Badge],
    unjustified: &[Registration],
    now: NaiveDateTime,
    policy: SanctionPolicy,
) -> SanctionPlan {
    let today = now.date();
    let mut result = SanctionPlan::default();

    let mut absences: Vec<&Registration> = unjustified
        .iter()
        .filter(|r| r.user_id == user_id && r.status == RegistrationStatus::UnJustifiedAbsentee)
        .collect();
    absences.sort_by_key(|r| r.queue_key());
    let absence_ids: HashSet<Uuid> = absences.iter().map(|r| r.id).collect();

    let own = badges.iter().filter(|b| b.user_id == user_id);

    // Step 1: one warning per unjustified absence
    let mut warnings: Vec<Badge> = Vec::new();
    let mut warned: HashSet<Uuid> = HashSet::new();
    for badge in own.clone().filter(|b| b.kind == BadgeKind::UnjustifiedAbsenceWarning) {
        match badge.registration_id {
            Some(reg) if !absence_ids.contains(&reg) || warned.contains(&reg) => {
                result.delete.push(badge.id);
            }
            Some(reg) => {
                warned.insert(reg);
                warnings.push(badge.clone());
            }
            None => warnings.push(badge.clone()),
        }
    }
    for absence in absences.iter().filter(|r| !warned.contains(&r.id)) {
        let warning = Badge::automatic(
            user_id,
            BadgeKind::UnjustifiedAbsenceWarning,
            absence.id,
            now,
            policy.federation_year_end_month,
        );
        warnings.push(warning.clone());
        result.create.push(warning);
    }

    // Step 2: suspensions required by warnings counted past the threshold
    let mut valid: Vec<&Badge> = warnings.iter().filter(|w| w.is_valid_at(today)).collect();
    valid.sort_by_key(|w| (w.creation_time, w.id));
    let first_suspending = policy.suspension_threshold.saturating_sub(1) as usize;
    let required: BTreeSet<Uuid> = valid
        .iter()
        .skip(first_suspending)
        .filter_map(|w| w.registration_id)
        .collect();

    // Step 3: match existing linked suspensions against the requirement
    let mut satisfied: HashSet<Uuid> = HashSet::new();
    for badge in own.filter(|b| b.kind == BadgeKind::Suspended && b.is_valid_at(today)) {
        let Some(reg) = badge.registration_id else {
            continue;
        };
        if required.contains(&reg) && !satisfied.contains(&reg) {
            satisfied.insert(reg);
        } else {
            result.delete.push(badge.id);
        }
    }
    for reg in required.iter().filter(|r| !satisfied.contains(*r)) {
        result.create.push(Badge::automatic(
            user_id,
            BadgeKind::Suspended,
            *reg,
            now,
            policy.federation_year_end_month,
        ));
    }

    result
}

/// Locks the user and applies [`plan`] inside `tx`.
pub async fn reconcile_user(
    tx: &mut dyn Transaction,
    user_id: &Uuid,
    now: NaiveDateTime,
    policy: SanctionPolicy,
) -> Result<SanctionPlan, DomainError> {
    tx.lock_user(user_id)
        .await?
        .ok_or_else(|| DomainError::not_found("user", user_id))?;
    let badges = tx.user_badges(user_id).await?;
    let unjustified = tx
        .user_registrations_with_status(user_id, RegistrationStatus::UnJustifiedAbsentee)
        .await?;

    let changes = plan(*user_id, &badges, &unjustified, now, policy);
    for id in &changes.delete {
        tx.delete_badge(id).await?;
    }
    for badge in &changes.create {
        tx.insert_badge(badge).await?;
    }
    if !changes.is_empty() {
        info!(
            user_id = %user_id,
            created = changes.create.len(),
            deleted = changes.delete.len(),
            "sanction badges reconciled"
        );
    }
    Ok(changes)
}

/// Applies `plan` to an in-memory badge list, used to check the fixed point.
pub fn apply(badges: &mut Vec<Badge>, changes: &SanctionPlan) {
    badges.retain(|b| !changes.delete.contains(&b.id));
    badges.extend(changes.create.iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    const POLICY: SanctionPolicy = SanctionPolicy { suspension_threshold: 3, federation_year_end_month: 9 };

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn absence(user: Uuid, minutes: i64) -> Registration {
        Registration::new(
            user,
            Uuid::new_v4(),
            RegistrationStatus::UnJustifiedAbsentee,
            true,
            now() - Duration::days(30) + Duration::minutes(minutes),
        )
    }

    fn suspensions(badges: &[Badge]) -> Vec<&Badge> {
        badges.iter().filter(|b| b.kind == BadgeKind::Suspended).collect()
    }

    #[test]
    fn test_third_absence_suspends() {
        let user = Uuid::new_v4();
        let absences: Vec<_> = (0..3).map(|i| absence(user, i)).collect();
        let mut badges = Vec::new();

        let changes = plan(user, &badges, &absences[..2], now(), POLICY);
        assert_eq!(changes.create.len(), 2);
        apply(&mut badges, &changes);
        assert!(suspensions(&badges).is_empty());

        let later = now() + Duration::hours(1);
        let changes = plan(user, &badges, &absences, later, POLICY);
        apply(&mut badges, &changes);
        let suspended = suspensions(&badges);
        assert_eq!(suspended.len(), 1);
        assert_eq!(suspended[0].registration_id, Some(absences[2].id));
    }

    #[test]
    fn test_reclassification_restores_previous_set() {
        let user = Uuid::new_v4();
        let absences: Vec<_> = (0..3).map(|i| absence(user, i)).collect();
        let mut badges = Vec::new();
        let changes = plan(user, &badges, &absences[..2], now(), POLICY);
        apply(&mut badges, &changes);
        let before = badges.clone();
        let later = now() + Duration::hours(1);
        let changes = plan(user, &badges, &absences, later, POLICY);
        apply(&mut badges, &changes);
        assert_eq!(badges.len(), 4);

        // third absence turned justified
        let changes = plan(user, &badges, &absences[..2], later, POLICY);
        apply(&mut badges, &changes);
        assert_eq!(badges, before);
    }

    #[test]
    fn test_manual_badges_untouched() {
        let user = Uuid::new_v4();
        let manual = Badge::new(user, BadgeKind::Suspended, None, now().date(), now()).unwrap();
        let changes = plan(user, &[manual], &[], now(), POLICY);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_expired_suspension_kept_as_history() {
        let user = Uuid::new_v4();
        let reg = absence(user, 0);
        let mut old = Badge::automatic(user, BadgeKind::Suspended, reg.id, now() - Duration::days(800), 9);
        old.expiration_date = now().date() - Duration::days(400);
        let changes = plan(user, &[old], &[], now(), POLICY);
        assert!(changes.delete.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Planning on the state produced by a plan yields nothing.
        #[test]
        fn prop_reconcile_is_a_fixed_point(
            count in 0usize..7,
            keep in proptest::collection::vec(any::<bool>(), 7),
            threshold in 1u32..5,
        ) {
            let user = Uuid::new_v4();
            let policy = SanctionPolicy { suspension_threshold: threshold, federation_year_end_month: 9 };
            let absences: Vec<_> = (0..count).map(|i| absence(user, i as i64)).collect();
            let mut badges = Vec::new();
            let changes = plan(user, &badges, &absences, now(), policy);
            apply(&mut badges, &changes);

            let remaining: Vec<_> = absences
                .iter()
                .zip(keep.iter())
                .filter(|(_, k)| **k)
                .map(|(r, _)| r.clone())
                .collect();
            let later = now() + Duration::minutes(5);
            let changes = plan(user, &badges, &remaining, later, policy);
            apply(&mut badges, &changes);

            prop_assert!(plan(user, &badges, &remaining, later, policy).is_empty());
            let warnings = badges.iter().filter(|b| b.kind == BadgeKind::UnjustifiedAbsenceWarning).count();
            prop_assert_eq!(warnings, remaining.len());
            let expected_suspensions = remaining.len().saturating_sub(threshold as usize - 1);
            prop_assert_eq!(suspensions(&badges).len(), expected_suspensions);
        }
    }
}
