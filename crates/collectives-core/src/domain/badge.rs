// ============================================================================
// Collectives Core - Badge Entity
// File: crates/collectives-core/src/domain/badge.rs
// Description: Grants, warning counters and sanctions held by users
// ============================================================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::federation::federation_year_end;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCategory {
    Grant,
    Warning,
    Sanction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelScale {
    /// The kind carries no level
    Unleveled,
    /// Levels are comparable within `[min, max]`
    Ordered { min: i32, max: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityRequirement {
    Required,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Expires at the end of the current federation year
    FederationYearEnd,
}

/// Per-kind semantics of a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeDescriptor {
    pub category: BadgeCategory,
    pub level: LevelScale,
    pub activity: ActivityRequirement,
    pub expiry: ExpiryPolicy,
}

/// Badge kind, carrying its level where the kind has one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeKind {
    /// Technical competency for an activity
    Competency { level: i32 },
    Volunteer,
    UnjustifiedAbsenceWarning,
    Suspended,
}

impl BadgeKind {
    pub fn descriptor(&self) -> BadgeDescriptor {
        match self {
            BadgeKind::Competency { .. } => BadgeDescriptor {
                category: BadgeCategory::Grant,
                level: LevelScale::Ordered { min: 1, max: 5 },
                activity: ActivityRequirement::Required,
                expiry: ExpiryPolicy::FederationYearEnd,
            },
            BadgeKind::Volunteer => BadgeDescriptor {
                category: BadgeCategory::Grant,
                level: LevelScale::Unleveled,
                activity: ActivityRequirement::Forbidden,
                expiry: ExpiryPolicy::FederationYearEnd,
            },
            BadgeKind::UnjustifiedAbsenceWarning => BadgeDescriptor {
                category: BadgeCategory::Warning,
                level: LevelScale::Unleveled,
                activity: ActivityRequirement::Forbidden,
                expiry: ExpiryPolicy::FederationYearEnd,
            },
            BadgeKind::Suspended => BadgeDescriptor {
                category: BadgeCategory::Sanction,
                level: LevelScale::Unleveled,
                activity: ActivityRequirement::Forbidden,
                expiry: ExpiryPolicy::FederationYearEnd,
            },
        }
    }

    /// Storage tag, independent of the level.
    pub fn tag(&self) -> &'static str {
        match self {
            BadgeKind::Competency { .. } => "competency",
            BadgeKind::Volunteer => "volunteer",
            BadgeKind::UnjustifiedAbsenceWarning => "unjustified_absence_warning",
            BadgeKind::Suspended => "suspended",
        }
    }

    pub fn level(&self) -> Option<i32> {
        match self {
            BadgeKind::Competency { level } => Some(*level),
            _ => None,
        }
    }

    /// Rebuilds a kind from its stored tag and level.
    pub fn from_parts(tag: &str, level: Option<i32>) -> Option<Self> {
        match (tag, level) {
            ("competency", Some(level)) => Some(BadgeKind::Competency { level }),
            ("volunteer", _) => Some(BadgeKind::Volunteer),
            ("unjustified_absence_warning", _) => Some(BadgeKind::UnjustifiedAbsenceWarning),
            ("suspended", _) => Some(BadgeKind::Suspended),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BadgeKind::Competency { .. } => "Competency",
            BadgeKind::Volunteer => "Volunteer",
            BadgeKind::UnjustifiedAbsenceWarning => "Unjustified absence warning",
            BadgeKind::Suspended => "Suspended",
        }
    }

    pub fn default_expiration(&self, today: NaiveDate, federation_year_end_month: u32) -> NaiveDate {
        match self.descriptor().expiry {
            ExpiryPolicy::FederationYearEnd => federation_year_end(today, federation_year_end_month),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: BadgeKind,
    pub activity_id: Option<Uuid>,
    pub expiration_date: NaiveDate,
    pub grantor_id: Option<Uuid>,
    pub creation_time: NaiveDateTime,
    /// Registration that triggered an automatic badge
    pub registration_id: Option<Uuid>,
}

impl Badge {
    pub fn new(
        user_id: Uuid,
        kind: BadgeKind,
        activity_id: Option<Uuid>,
        expiration_date: NaiveDate,
        creation_time: NaiveDateTime,
    ) -> Result<Self, DomainError> {
        let descriptor = kind.descriptor();
        match (descriptor.activity, activity_id) {
            (ActivityRequirement::Required, None) => {
                return Err(DomainError::Validation(format!(
                    "badge {} requires an activity",
                    kind.tag()
                )))
            }
            (ActivityRequirement::Forbidden, Some(_)) => {
                return Err(DomainError::Validation(format!(
                    "badge {} cannot be bound to an activity",
                    kind.tag()
                )))
            }
            _ => {}
        }
        if let (LevelScale::Ordered { min, max }, Some(level)) = (descriptor.level, kind.level()) {
            if level < min || level > max {
                return Err(DomainError::Validation(format!(
                    "badge level {} outside [{}, {}]",
                    level, min, max
                )));
            }
        }

        Ok(Self {
            id: collectives_shared::new_id(),
            user_id,
            kind,
            activity_id,
            expiration_date,
            grantor_id: None,
            creation_time,
            registration_id: None,
        })
    }

    /// Badge created by the sanction engine for `registration_id`.
    pub fn automatic(
        user_id: Uuid,
        kind: BadgeKind,
        registration_id: Uuid,
        creation_time: NaiveDateTime,
        federation_year_end_month: u32,
    ) -> Self {
        Self {
            id: collectives_shared::new_id(),
            user_id,
            kind,
            activity_id: None,
            expiration_date: kind.default_expiration(creation_time.date(), federation_year_end_month),
            grantor_id: None,
            creation_time,
            registration_id: Some(registration_id),
        }
    }

    pub fn is_valid_at(&self, today: NaiveDate) -> bool {
        today <= self.expiration_date
    }

    pub fn is_blocking_at(&self, today: NaiveDate) -> bool {
        self.kind.descriptor().category == BadgeCategory::Sanction && self.is_valid_at(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_competency_requires_activity() {
        let now = today().and_hms_opt(8, 0, 0).unwrap();
        let kind = BadgeKind::Competency { level: 2 };
        assert!(Badge::new(Uuid::nil(), kind, None, today(), now).is_err());
        assert!(Badge::new(Uuid::nil(), kind, Some(Uuid::nil()), today(), now).is_ok());
    }

    #[test]
    fn test_level_range_checked() {
        let now = today().and_hms_opt(8, 0, 0).unwrap();
        let kind = BadgeKind::Competency { level: 9 };
        assert!(Badge::new(Uuid::nil(), kind, Some(Uuid::nil()), today(), now).is_err());
    }

    #[test]
    fn test_kind_from_parts() {
        assert_eq!(
            BadgeKind::from_parts("competency", Some(3)),
            Some(BadgeKind::Competency { level: 3 })
        );
        assert_eq!(BadgeKind::from_parts("competency", None), None);
        assert_eq!(BadgeKind::from_parts("suspended", None), Some(BadgeKind::Suspended));
    }

    #[test]
    fn test_automatic_badge_expires_at_year_end() {
        let now = today().and_hms_opt(8, 0, 0).unwrap();
        let badge = Badge::automatic(Uuid::nil(), BadgeKind::Suspended, Uuid::nil(), now, 9);
        assert_eq!(badge.expiration_date, NaiveDate::from_ymd_opt(2027, 9, 30).unwrap());
        assert!(badge.is_blocking_at(today()));
        assert!(!badge.is_blocking_at(NaiveDate::from_ymd_opt(2027, 10, 1).unwrap()));
    }
}
