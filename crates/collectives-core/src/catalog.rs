// ============================================================================
// Collectives Core - Identity & Role Catalog
// File: crates/collectives-core/src/catalog.rs
// Description: Per-request capability set of a caller
// ============================================================================
//! A caller's roles are loaded once per request and flattened into
//! [`Capabilities`]. Disabled or license-expired users get an empty set, so
//! every role predicate is false for them without special cases downstream.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::domain::{Role, RoleKind, User};
use crate::error::DomainError;

const MODERATOR_KINDS: &[RoleKind] = &[RoleKind::Moderator, RoleKind::Administrator, RoleKind::President];
const EVENT_CREATOR_KINDS: &[RoleKind] = &[
    RoleKind::EventLeader,
    RoleKind::ActivitySupervisor,
    RoleKind::President,
    RoleKind::Administrator,
    RoleKind::Staff,
];
const LEADER_KINDS: &[RoleKind] = &[RoleKind::EventLeader, RoleKind::ActivitySupervisor];
const CO_LEADER_KINDS: &[RoleKind] =
    &[RoleKind::Trainee, RoleKind::EventLeader, RoleKind::ActivitySupervisor];

/// Set of activities a user supervises
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityScope {
    All,
    Only(BTreeSet<Uuid>),
}

impl ActivityScope {
    pub fn contains(&self, activity_id: &Uuid) -> bool {
        match self {
            ActivityScope::All => true,
            ActivityScope::Only(ids) => ids.contains(activity_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ActivityScope::Only(ids) if ids.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub user_id: Uuid,
    roles: Vec<(RoleKind, Option<Uuid>)>,
}

impl Capabilities {
    /// Capabilities of `user` at `now`; empty when the account is not active.
    pub fn resolve(user: &User, roles: &[Role], now: NaiveDateTime) -> Self {
        if !user.is_active(now) {
            return Self::empty(user.id);
        }
        Self::from_roles(user.id, roles)
    }

    pub fn from_roles(user_id: Uuid, roles: &[Role]) -> Self {
        Self {
            user_id,
            roles: roles
                .iter()
                .filter(|r| r.user_id == user_id)
                .map(|r| (r.kind, r.activity_id))
                .collect(),
        }
    }

    pub fn empty(user_id: Uuid) -> Self {
        Self { user_id, roles: Vec::new() }
    }

    pub fn roles_of(&self) -> &[(RoleKind, Option<Uuid>)] {
        &self.roles
    }

    pub fn has_any_role(&self) -> bool {
        !self.roles.is_empty()
    }

    /// Activity-agnostic role check.
    pub fn has_role(&self, kinds: &[RoleKind]) -> bool {
        self.roles.iter().any(|(kind, _)| kinds.contains(kind))
    }

    pub fn has_role_for(&self, kinds: &[RoleKind], activity_id: &Uuid) -> bool {
        self.roles
            .iter()
            .any(|(kind, activity)| kinds.contains(kind) && activity.as_ref() == Some(activity_id))
    }

    /// Any role bound to `activity_id`.
    pub fn has_any_role_for(&self, activity_id: &Uuid) -> bool {
        self.roles.iter().any(|(_, activity)| activity.as_ref() == Some(activity_id))
    }

    pub fn supervised_activities(&self) -> ActivityScope {
        if self.has_role(&[RoleKind::Administrator, RoleKind::President]) {
            return ActivityScope::All;
        }
        ActivityScope::Only(self.activities_with(&[RoleKind::ActivitySupervisor]))
    }

    pub fn supervises(&self, activity_id: &Uuid) -> bool {
        self.supervised_activities().contains(activity_id)
    }

    /// Activities this user may lead an event for.
    pub fn leadable_activities(&self) -> BTreeSet<Uuid> {
        self.activities_with(LEADER_KINDS)
    }

    pub fn can_lead(&self, activity_id: &Uuid) -> bool {
        self.has_role_for(LEADER_KINDS, activity_id)
    }

    /// Trainees and leaders may be marked co-leader of an event of the activity.
    pub fn can_co_lead(&self, activity_id: &Uuid) -> bool {
        self.has_role_for(CO_LEADER_KINDS, activity_id)
    }

    pub fn is_moderator(&self) -> bool {
        self.has_role(MODERATOR_KINDS)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&[RoleKind::Administrator])
    }

    pub fn is_supervisor(&self) -> bool {
        self.has_role(&[RoleKind::ActivitySupervisor]) || self.is_moderator()
    }

    pub fn is_hotline(&self) -> bool {
        self.has_role(&[RoleKind::Hotline]) || self.is_admin()
    }

    pub fn can_create_events(&self) -> bool {
        self.has_role(EVENT_CREATOR_KINDS)
    }

    fn activities_with(&self, kinds: &[RoleKind]) -> BTreeSet<Uuid> {
        self.roles
            .iter()
            .filter(|(kind, _)| kinds.contains(kind))
            .filter_map(|(_, activity)| *activity)
            .collect()
    }
}

/// Who is calling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Member(Capabilities),
}

impl Caller {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::Anonymous => None,
            Caller::Member(caps) => Some(caps.user_id),
        }
    }

    pub fn capabilities(&self) -> Option<&Capabilities> {
        match self {
            Caller::Anonymous => None,
            Caller::Member(caps) => Some(caps),
        }
    }

    pub fn require_member(&self) -> Result<&Capabilities, DomainError> {
        self.capabilities().ok_or(DomainError::NotAuthenticated)
    }

    pub fn is_moderator(&self) -> bool {
        self.capabilities().is_some_and(Capabilities::is_moderator)
    }
}
