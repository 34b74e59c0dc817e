// ============================================================================
// Collectives Core - Role Entity
// File: crates/collectives-core/src/domain/role.rs
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Kind of a role. Global kinds are site-wide, the others are granted for a
/// single activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Administrator,
    Moderator,
    President,
    Technician,
    Hotline,
    Accountant,
    Staff,
    EventLeader,
    ActivitySupervisor,
    Trainee,
    EquipmentManager,
    EquipmentVolunteer,
    ActivityStaff,
}

impl RoleKind {
    pub const ALL: [RoleKind; 13] = [
        RoleKind::Administrator,
        RoleKind::Moderator,
        RoleKind::President,
        RoleKind::Technician,
        RoleKind::Hotline,
        RoleKind::Accountant,
        RoleKind::Staff,
        RoleKind::EventLeader,
        RoleKind::ActivitySupervisor,
        RoleKind::Trainee,
        RoleKind::EquipmentManager,
        RoleKind::EquipmentVolunteer,
        RoleKind::ActivityStaff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Administrator => "administrator",
            RoleKind::Moderator => "moderator",
            RoleKind::President => "president",
            RoleKind::Technician => "technician",
            RoleKind::Hotline => "hotline",
            RoleKind::Accountant => "accountant",
            RoleKind::Staff => "staff",
            RoleKind::EventLeader => "event_leader",
            RoleKind::ActivitySupervisor => "activity_supervisor",
            RoleKind::Trainee => "trainee",
            RoleKind::EquipmentManager => "equipment_manager",
            RoleKind::EquipmentVolunteer => "equipment_volunteer",
            RoleKind::ActivityStaff => "activity_staff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Kinds that are only meaningful for a given activity.
    pub fn requires_activity(&self) -> bool {
        matches!(
            self,
            RoleKind::EventLeader
                | RoleKind::ActivitySupervisor
                | RoleKind::Trainee
                | RoleKind::ActivityStaff
        )
    }

    pub fn is_global(&self) -> bool {
        !self.requires_activity()
    }
}

/// A (kind, activity) grant held by a user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: RoleKind,
    pub activity_id: Option<Uuid>,
}

impl Role {
    /// Builds a role, enforcing that per-activity kinds carry an activity and
    /// global kinds do not.
    pub fn new(user_id: Uuid, kind: RoleKind, activity_id: Option<Uuid>) -> Result<Self, DomainError> {
        match (kind.requires_activity(), activity_id) {
            (true, None) => Err(DomainError::Validation(format!(
                "role {} requires an activity",
                kind.as_str()
            ))),
            (false, Some(_)) => Err(DomainError::Validation(format!(
                "role {} cannot be bound to an activity",
                kind.as_str()
            ))),
            _ => Ok(Self {
                id: collectives_shared::new_id(),
                user_id,
                kind,
                activity_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_kind_round_trip_names() {
        for kind in RoleKind::ALL {
            assert_eq!(RoleKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(RoleKind::from_str("pope"), None);
    }

    #[test]
    fn test_activity_requirement_enforced() {
        let user = Uuid::nil();
        assert!(Role::new(user, RoleKind::EventLeader, None).is_err());
        assert!(Role::new(user, RoleKind::Moderator, Some(Uuid::nil())).is_err());
        assert!(Role::new(user, RoleKind::Trainee, Some(Uuid::nil())).is_ok());
        assert!(Role::new(user, RoleKind::President, None).is_ok());
    }
}
